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

//! Bank Consent Monitoring Handler
//!
//! A user approving a data-sharing consent in their banking app can take an
//! unbounded time, so the wait is modeled as a finite chain of discrete check
//! tasks instead of a blocking wait. Each check queries the bank once:
//!
//! - Approved: persist the active consent, load the covered accounts, emit
//!   `AccountsLoaded`, and end the chain — no follow-up task.
//! - Not approved with checks remaining: schedule a brand-new task with
//!   `current_check + 1` two minutes out and complete this one; the chain
//!   continues via the new task, never by retrying this one.
//! - Not approved with the window exhausted: the chain ends without error —
//!   a deliberate timeout, not a failure.
//!
//! Two bounds coexist and stay orthogonal: the engine's `max_retries` bounds
//! transient failures of a single check, while the payload's
//! `max_checks`/`current_check` bound the total polling steps across the
//! whole approval wait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::clients::{
    AccountRepository, ActiveConsent, AuthTokenProvider, BankApiClient, ConsentRepository,
    ConsentStatus, ConsentStatusResponse, DomainEvent, EventPublisher,
};
use crate::error::{ClientError, HandlerError};
use crate::models::ScheduledTask;
use crate::scheduler::SchedulerService;
use crate::task::{task_types, TaskHandler};

/// Fixed interval between consecutive consent checks.
const CHECK_INTERVAL_SECS: i64 = 120;

/// Polls a bank for consent approval using the self-rescheduling pattern.
pub struct ConsentMonitoringHandler {
    scheduler: Arc<SchedulerService>,
    bank_api: Arc<dyn BankApiClient>,
    tokens: Arc<dyn AuthTokenProvider>,
    consents: Arc<dyn ConsentRepository>,
    accounts: Arc<dyn AccountRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ConsentMonitoringHandler {
    pub fn new(
        scheduler: Arc<SchedulerService>,
        bank_api: Arc<dyn BankApiClient>,
        tokens: Arc<dyn AuthTokenProvider>,
        consents: Arc<dyn ConsentRepository>,
        accounts: Arc<dyn AccountRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            scheduler,
            bank_api,
            tokens,
            consents,
            accounts,
            events,
        }
    }

    /// Performs the approval side effects: persist the active consent, load
    /// the covered accounts, and announce them.
    async fn activate_consent(
        &self,
        client_id: &str,
        bank_code: &str,
        auth_token: &str,
        response: ConsentStatusResponse,
    ) -> Result<(), HandlerError> {
        let consent_id = response.consent_id.ok_or_else(|| {
            ClientError::BankApi("approved consent response carried no consent id".to_string())
        })?;

        self.consents
            .save_active_consent(ActiveConsent {
                client_id: client_id.to_string(),
                bank_code: bank_code.to_string(),
                consent_id: consent_id.clone(),
                permissions: response.permissions,
                expires_at: response.expires_at,
            })
            .await?;

        let accounts = self
            .bank_api
            .fetch_accounts(bank_code, auth_token, &consent_id, client_id)
            .await?;
        self.accounts.store_accounts(client_id, &accounts).await?;

        info!(
            client_id,
            bank_code,
            account_count = accounts.len(),
            "Consent approved; accounts loaded"
        );

        let event = DomainEvent::AccountsLoaded {
            client_id: client_id.to_string(),
            bank_code: bank_code.to_string(),
            account_count: accounts.len(),
        };
        if let Err(e) = self.events.publish(event).await {
            warn!(client_id, error = %e, "Event publication failed; ignoring");
        }

        Ok(())
    }

    /// Enqueues the next check in the chain with an incremented
    /// `current_check` and a fresh task name.
    async fn schedule_next_check(
        &self,
        task: &ScheduledTask,
        request_id: &str,
        next_check: i64,
    ) -> Result<(), HandlerError> {
        let mut payload = task.payload.clone();
        payload.insert("current_check".to_string(), json!(next_check));

        self.scheduler
            .schedule_task(
                task_types::BANK_CONSENT_MONITORING,
                format!("consent-check-{}-{}", request_id, next_check),
                payload,
                Utc::now() + Duration::seconds(CHECK_INTERVAL_SECS),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TaskHandler for ConsentMonitoringHandler {
    fn task_type(&self) -> &str {
        task_types::BANK_CONSENT_MONITORING
    }

    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let client_id = task.payload_str("client_id")?;
        let bank_code = task.payload_str("bank_code")?;
        let request_id = task.payload_str("request_id")?;
        let max_checks = task.payload_i64("max_checks")?;
        let current_check = task.payload_i64_or("current_check", 0)?;

        let token = self.tokens.team_token().await?;
        let status = self
            .bank_api
            .check_consent_status(bank_code, &token, request_id)
            .await?;

        match status {
            Some(response) if response.status == ConsentStatus::Approved => {
                self.activate_consent(client_id, bank_code, &token, response)
                    .await
            }
            _ => {
                // Not approved: Pending, Rejected, or unknown to the bank.
                if current_check < max_checks - 1 {
                    self.schedule_next_check(task, request_id, current_check + 1)
                        .await?;
                    info!(
                        client_id,
                        request_id,
                        next_check = current_check + 1,
                        max_checks,
                        "Consent not yet approved; next check scheduled"
                    );
                } else {
                    // Deliberate timeout: the polling window is exhausted and
                    // the chain ends without error.
                    info!(
                        client_id,
                        request_id, max_checks, "Consent polling window exhausted without approval"
                    );
                }
                Ok(())
            }
        }
    }

    /// Polling steps are not kept; a completed check purges its row.
    fn delete_after_success(&self) -> bool {
        true
    }
}
