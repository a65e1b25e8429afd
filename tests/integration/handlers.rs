/*
 *  Copyright 2025 Copia Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Business handler tests, centered on the consent-monitoring chain: chain
//! termination on approval, deliberate timeout, continuation with a fresh
//! task, and the orthogonality of engine retries and the polling bound.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use copia::{
    AccountRepository, ActiveConsent, AuthTokenProvider, BalanceUpdateHandler, BankAccount,
    BankApiClient, ClientError, ConsentMonitoringHandler, ConsentRepository, ConsentStatus,
    ConsentStatusResponse, DomainEvent, EventPublisher, MlAnalysisGateway, MlTriggerHandler,
    SchedulerConfig, SchedulerService, TaskStatus,
};

use crate::fixtures;

// ---------------------------------------------------------------------------
// Collaborator mocks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockBankApi {
    consent_status: Mutex<Option<ConsentStatusResponse>>,
    accounts: Mutex<Vec<BankAccount>>,
    fail_status_check: AtomicBool,
}

impl MockBankApi {
    fn with_status(status: Option<ConsentStatusResponse>) -> Self {
        Self {
            consent_status: Mutex::new(status),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BankApiClient for MockBankApi {
    async fn check_consent_status(
        &self,
        _bank_code: &str,
        _auth_token: &str,
        _request_id: &str,
    ) -> Result<Option<ConsentStatusResponse>, ClientError> {
        if self.fail_status_check.load(Ordering::SeqCst) {
            return Err(ClientError::BankApi("connection reset".to_string()));
        }
        Ok(self.consent_status.lock().unwrap().clone())
    }

    async fn fetch_accounts(
        &self,
        _bank_code: &str,
        _auth_token: &str,
        _consent_id: &str,
        _client_id: &str,
    ) -> Result<Vec<BankAccount>, ClientError> {
        Ok(self.accounts.lock().unwrap().clone())
    }
}

struct StaticTokens;

#[async_trait]
impl AuthTokenProvider for StaticTokens {
    async fn team_token(&self) -> Result<String, ClientError> {
        Ok("token-1".to_string())
    }
}

#[derive(Default)]
struct MockConsents {
    saved: Mutex<Vec<ActiveConsent>>,
    active: Mutex<Option<ActiveConsent>>,
}

#[async_trait]
impl ConsentRepository for MockConsents {
    async fn save_active_consent(&self, consent: ActiveConsent) -> Result<(), ClientError> {
        self.saved.lock().unwrap().push(consent);
        Ok(())
    }

    async fn active_consent(
        &self,
        _client_id: &str,
        _bank_code: &str,
    ) -> Result<Option<ActiveConsent>, ClientError> {
        Ok(self.active.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct MockAccounts {
    stored: Mutex<Vec<(String, Vec<BankAccount>)>>,
}

#[async_trait]
impl AccountRepository for MockAccounts {
    async fn store_accounts(
        &self,
        client_id: &str,
        accounts: &[BankAccount],
    ) -> Result<(), ClientError> {
        self.stored
            .lock()
            .unwrap()
            .push((client_id.to_string(), accounts.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
struct MockEvents {
    published: Mutex<Vec<DomainEvent>>,
    fail: AtomicBool,
}

#[async_trait]
impl EventPublisher for MockEvents {
    async fn publish(&self, event: DomainEvent) -> Result<(), ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Publish("broker unavailable".to_string()));
        }
        self.published.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
struct MockMlGateway {
    triggered: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MlAnalysisGateway for MockMlGateway {
    async fn trigger_analysis(
        &self,
        client_id: &str,
        request_id: &str,
    ) -> Result<(), ClientError> {
        self.triggered
            .lock()
            .unwrap()
            .push((client_id.to_string(), request_id.to_string()));
        Ok(())
    }
}

fn sample_account(client_id: &str) -> BankAccount {
    BankAccount {
        account_id: "acc-1".to_string(),
        client_id: client_id.to_string(),
        bank_code: "alfa".to_string(),
        name: "Checking".to_string(),
        currency: "EUR".to_string(),
        balance: 1250.75,
    }
}

fn approved_response() -> ConsentStatusResponse {
    ConsentStatusResponse {
        status: ConsentStatus::Approved,
        consent_id: Some("cons-9".to_string()),
        permissions: vec!["ReadAccounts".to_string(), "ReadBalances".to_string()],
        expires_at: Some(Utc::now() + Duration::days(90)),
    }
}

fn pending_response() -> ConsentStatusResponse {
    ConsentStatusResponse {
        status: ConsentStatus::Pending,
        consent_id: None,
        permissions: vec![],
        expires_at: None,
    }
}

struct ConsentSetup {
    service: Arc<SchedulerService>,
    handler: ConsentMonitoringHandler,
    bank_api: Arc<MockBankApi>,
    consents: Arc<MockConsents>,
    accounts: Arc<MockAccounts>,
    events: Arc<MockEvents>,
}

fn consent_setup(fixture: &fixtures::TestFixture, status: Option<ConsentStatusResponse>) -> ConsentSetup {
    let service = Arc::new(SchedulerService::new(
        fixture.dal(),
        SchedulerConfig::default(),
    ));
    let bank_api = Arc::new(MockBankApi::with_status(status));
    let consents = Arc::new(MockConsents::default());
    let accounts = Arc::new(MockAccounts::default());
    let events = Arc::new(MockEvents::default());

    let handler = ConsentMonitoringHandler::new(
        service.clone(),
        bank_api.clone(),
        Arc::new(StaticTokens),
        consents.clone(),
        accounts.clone(),
        events.clone(),
    );

    ConsentSetup {
        service,
        handler,
        bank_api,
        consents,
        accounts,
        events,
    }
}

fn consent_payload(current_check: i64, max_checks: i64) -> copia::TaskPayload {
    fixtures::payload(json!({
        "client_id": "c-1",
        "bank_code": "alfa",
        "request_id": "req-7",
        "max_checks": max_checks,
        "current_check": current_check,
    }))
}

// ---------------------------------------------------------------------------
// Consent monitoring chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approved_consent_ends_the_chain_and_loads_accounts() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let setup = consent_setup(&fixture, Some(approved_response()));
    setup
        .bank_api
        .accounts
        .lock()
        .unwrap()
        .push(sample_account("c-1"));

    setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-req-7-2",
            consent_payload(2, 5),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    // The consent is persisted and the covered accounts are loaded.
    let saved = setup.consents.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].consent_id, "cons-9");
    assert_eq!(saved[0].client_id, "c-1");

    let stored = setup.accounts.stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].1.len(), 1);

    assert!(setup
        .events
        .published
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, DomainEvent::AccountsLoaded { account_count: 1, .. })));

    // No follow-up task, and the polling step itself is purged.
    let remaining = dal
        .scheduled_tasks()
        .find_by_type("BANK_CONSENT_MONITORING")
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn pending_consent_schedules_exactly_one_follow_up_check() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let setup = consent_setup(&fixture, Some(pending_response()));

    let original = setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-req-7-0",
            consent_payload(0, 5),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    let before = Utc::now();
    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    let remaining = dal
        .scheduled_tasks()
        .find_by_type("BANK_CONSENT_MONITORING")
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1, "Chain continues via exactly one new task");

    let follow_up = &remaining[0];
    assert_ne!(follow_up.id, original.id);
    assert_eq!(follow_up.status, TaskStatus::Pending);
    assert_eq!(follow_up.payload["current_check"], json!(1));
    assert_eq!(follow_up.payload["max_checks"], json!(5));
    assert_eq!(follow_up.payload["request_id"], json!("req-7"));
    assert_eq!(follow_up.task_name, "consent-check-req-7-1");

    let delay = (follow_up.scheduled_time - before).num_seconds();
    assert!(
        (115..=125).contains(&delay),
        "Follow-up must be ~120s out, got {}s",
        delay
    );

    // Nothing approved yet, so no consent/account side effects.
    assert!(setup.consents.saved.lock().unwrap().is_empty());
    assert!(setup.accounts.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_polling_window_ends_the_chain_without_error() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let setup = consent_setup(&fixture, Some(pending_response()));

    // current_check = max_checks - 1: the last allowed check.
    setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-req-7-4",
            consent_payload(4, 5),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    // Deliberate timeout: no follow-up, no failure, the step is purged.
    let remaining = dal
        .scheduled_tasks()
        .find_by_type("BANK_CONSENT_MONITORING")
        .await
        .unwrap();
    assert!(remaining.is_empty());
    assert!(setup.consents.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_request_is_treated_as_not_approved() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    // The bank does not know the request: check_consent_status returns None.
    let setup = consent_setup(&fixture, None);

    setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-req-7-0",
            consent_payload(0, 3),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    let remaining = dal
        .scheduled_tasks()
        .find_by_type("BANK_CONSENT_MONITORING")
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].payload["current_check"], json!(1));
}

#[tokio::test]
async fn bank_error_flows_through_engine_retry_not_the_chain_bound() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let setup = consent_setup(&fixture, Some(pending_response()));
    setup.bank_api.fail_status_check.store(true, Ordering::SeqCst);

    let task = setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-req-7-1",
            consent_payload(1, 5),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    // The check itself retries through the engine; the chain position is
    // untouched and no follow-up task exists.
    let stored = dal.scheduled_tasks().get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.retry_count, 1);
    assert!(stored
        .last_error
        .as_deref()
        .unwrap()
        .contains("connection reset"));
    assert_eq!(stored.payload["current_check"], json!(1));

    let all = dal
        .scheduled_tasks()
        .find_by_type("BANK_CONSENT_MONITORING")
        .await
        .unwrap();
    assert_eq!(all.len(), 1, "A failing check must not spawn a follow-up");
}

#[tokio::test]
async fn malformed_consent_payload_fails_fast_as_retryable() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let setup = consent_setup(&fixture, Some(pending_response()));

    // request_id missing entirely.
    let task = setup
        .service
        .schedule_task(
            "BANK_CONSENT_MONITORING",
            "consent-check-broken",
            fixtures::payload(json!({"client_id": "c-1", "bank_code": "alfa", "max_checks": 5})),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    setup.service.process_due_tasks(&setup.handler).await.unwrap();

    let stored = dal.scheduled_tasks().get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.retry_count, 1);
    assert!(stored.last_error.as_deref().unwrap().contains("request_id"));
}

// ---------------------------------------------------------------------------
// Balance update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_update_refreshes_accounts_through_active_consent() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let service = SchedulerService::new(fixture.dal(), SchedulerConfig::default());

    let bank_api = Arc::new(MockBankApi::default());
    bank_api.accounts.lock().unwrap().push(sample_account("c-1"));
    let consents = Arc::new(MockConsents::default());
    *consents.active.lock().unwrap() = Some(ActiveConsent {
        client_id: "c-1".to_string(),
        bank_code: "alfa".to_string(),
        consent_id: "cons-9".to_string(),
        permissions: vec!["ReadBalances".to_string()],
        expires_at: None,
    });
    let accounts = Arc::new(MockAccounts::default());
    let events = Arc::new(MockEvents::default());

    let handler = BalanceUpdateHandler::new(
        bank_api,
        Arc::new(StaticTokens),
        consents,
        accounts.clone(),
        events.clone(),
    );

    let task = service
        .schedule_task(
            "BALANCE_UPDATE",
            "refresh-c1-alfa",
            fixtures::payload(json!({"client_id": "c-1", "bank_code": "alfa"})),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    service.process_due_tasks(&handler).await.unwrap();

    assert_eq!(accounts.stored.lock().unwrap().len(), 1);
    assert!(events
        .published
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, DomainEvent::BalancesRefreshed { account_count: 1, .. })));

    // Recurring business operation: the row is retained as Completed.
    let stored = dal.scheduled_tasks().get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

#[tokio::test]
async fn balance_update_without_consent_completes_without_side_effects() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let service = SchedulerService::new(fixture.dal(), SchedulerConfig::default());

    let accounts = Arc::new(MockAccounts::default());
    let events = Arc::new(MockEvents::default());
    let handler = BalanceUpdateHandler::new(
        Arc::new(MockBankApi::default()),
        Arc::new(StaticTokens),
        Arc::new(MockConsents::default()),
        accounts.clone(),
        events.clone(),
    );

    let task = service
        .schedule_task(
            "BALANCE_UPDATE",
            "refresh-nobody",
            fixtures::payload(json!({"client_id": "c-9", "bank_code": "alfa"})),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    service.process_due_tasks(&handler).await.unwrap();

    assert!(accounts.stored.lock().unwrap().is_empty());
    assert!(events.published.lock().unwrap().is_empty());
    let stored = dal.scheduled_tasks().get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

// ---------------------------------------------------------------------------
// Event publication is fire-and-forget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_failure_does_not_affect_task_completion() {
    let fixture = fixtures::setup().await;
    let dal = fixture.dal();
    let service = SchedulerService::new(fixture.dal(), SchedulerConfig::default());

    let gateway = Arc::new(MockMlGateway::default());
    let events = Arc::new(MockEvents::default());
    events.fail.store(true, Ordering::SeqCst);

    let handler = MlTriggerHandler::new(gateway.clone(), events);

    let task = service
        .schedule_task(
            "ML_ANALYSIS",
            "analyze-c1",
            fixtures::payload(json!({"client_id": "c-1", "request_id": "req-ml-1"})),
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    service.process_due_tasks(&handler).await.unwrap();

    let triggered = gateway.triggered.lock().unwrap();
    assert_eq!(*triggered, vec![("c-1".to_string(), "req-ml-1".to_string())]);

    // Task purged despite the publish failure.
    assert!(dal.scheduled_tasks().get_by_id(task.id).await.unwrap().is_none());
}
