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

//! Balance Update Handler
//!
//! Refreshes a client's account balances from a bank using their active
//! consent. A client without an active consent for the bank is not an error:
//! there is simply nothing to refresh. Re-running is harmless — the refresh
//! overwrites stored accounts with the bank's current view.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::{
    AccountRepository, AuthTokenProvider, BankApiClient, ConsentRepository, DomainEvent,
    EventPublisher,
};
use crate::error::HandlerError;
use crate::models::ScheduledTask;
use crate::task::{task_types, TaskHandler};

/// Refreshes account balances for one client at one bank.
pub struct BalanceUpdateHandler {
    bank_api: Arc<dyn BankApiClient>,
    tokens: Arc<dyn AuthTokenProvider>,
    consents: Arc<dyn ConsentRepository>,
    accounts: Arc<dyn AccountRepository>,
    events: Arc<dyn EventPublisher>,
}

impl BalanceUpdateHandler {
    pub fn new(
        bank_api: Arc<dyn BankApiClient>,
        tokens: Arc<dyn AuthTokenProvider>,
        consents: Arc<dyn ConsentRepository>,
        accounts: Arc<dyn AccountRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            bank_api,
            tokens,
            consents,
            accounts,
            events,
        }
    }
}

#[async_trait]
impl TaskHandler for BalanceUpdateHandler {
    fn task_type(&self) -> &str {
        task_types::BALANCE_UPDATE
    }

    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let client_id = task.payload_str("client_id")?;
        let bank_code = task.payload_str("bank_code")?;

        let consent = self.consents.active_consent(client_id, bank_code).await?;
        let Some(consent) = consent else {
            info!(client_id, bank_code, "No active consent; nothing to refresh");
            return Ok(());
        };

        let token = self.tokens.team_token().await?;
        let accounts = self
            .bank_api
            .fetch_accounts(bank_code, &token, &consent.consent_id, client_id)
            .await?;
        self.accounts.store_accounts(client_id, &accounts).await?;

        info!(
            client_id,
            bank_code,
            account_count = accounts.len(),
            "Balances refreshed"
        );

        let event = DomainEvent::BalancesRefreshed {
            client_id: client_id.to_string(),
            bank_code: bank_code.to_string(),
            account_count: accounts.len(),
        };
        if let Err(e) = self.events.publish(event).await {
            warn!(client_id, error = %e, "Event publication failed; ignoring");
        }

        Ok(())
    }

    /// Recurring business operation; completed runs are kept for audit.
    fn delete_after_success(&self) -> bool {
        false
    }
}
