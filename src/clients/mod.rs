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

//! External collaborator interfaces.
//!
//! The engine core treats everything beyond the task store as a boundary:
//! bank APIs, the auth token provider, domain persistence, and event
//! publication are specified here as traits and consumed only by business
//! handlers. Network and timeout failures surface as [`ClientError`] and flow
//! through the normal handler failure path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Approval state of a bank data-sharing consent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// The user approved the consent in their banking app
    Approved,
    /// Still awaiting user action
    Pending,
    /// The user rejected the request
    Rejected,
}

/// Result of a consent status check against a bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentStatusResponse {
    pub status: ConsentStatus,
    pub consent_id: Option<String>,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A bank account as reported by a bank's account endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: String,
    pub client_id: String,
    pub bank_code: String,
    pub name: String,
    pub currency: String,
    pub balance: f64,
}

/// An approved, active consent as persisted by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveConsent {
    pub client_id: String,
    pub bank_code: String,
    pub consent_id: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A product offered by a bank, as synchronized into the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOffering {
    pub product_id: String,
    pub bank_code: String,
    pub name: String,
    pub category: String,
    pub interest_rate: Option<f64>,
}

/// Domain events emitted after handlers complete.
///
/// Publication is fire-and-forget: a publish failure never affects the task's
/// completion status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    AccountsLoaded {
        client_id: String,
        bank_code: String,
        account_count: usize,
    },
    BalancesRefreshed {
        client_id: String,
        bank_code: String,
        account_count: usize,
    },
    ProductCatalogSynced {
        bank_code: String,
        product_count: usize,
    },
    TransactionsExported {
        client_id: String,
        exported: u64,
    },
    AnalysisRequested {
        client_id: String,
        request_id: String,
    },
}

/// Client for a bank's consent and account APIs.
#[async_trait]
pub trait BankApiClient: Send + Sync {
    /// Queries the approval status of a consent request.
    ///
    /// Returns `None` when the bank does not (or no longer does) know the
    /// request — treated by callers as not approved.
    async fn check_consent_status(
        &self,
        bank_code: &str,
        auth_token: &str,
        request_id: &str,
    ) -> Result<Option<ConsentStatusResponse>, ClientError>;

    /// Fetches the accounts covered by an approved consent.
    async fn fetch_accounts(
        &self,
        bank_code: &str,
        auth_token: &str,
        consent_id: &str,
        client_id: &str,
    ) -> Result<Vec<BankAccount>, ClientError>;
}

/// Client for a bank's product catalogue endpoint.
#[async_trait]
pub trait ProductCatalogClient: Send + Sync {
    async fn fetch_catalog(
        &self,
        bank_code: &str,
        auth_token: &str,
    ) -> Result<Vec<ProductOffering>, ClientError>;
}

/// Supplies the bearer credential used for bank API calls.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    async fn team_token(&self) -> Result<String, ClientError>;
}

/// Persistence for consents, used only by business handlers.
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn save_active_consent(&self, consent: ActiveConsent) -> Result<(), ClientError>;

    async fn active_consent(
        &self,
        client_id: &str,
        bank_code: &str,
    ) -> Result<Option<ActiveConsent>, ClientError>;
}

/// Persistence for bank accounts, used only by business handlers.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Stores or replaces the given accounts for a client.
    async fn store_accounts(
        &self,
        client_id: &str,
        accounts: &[BankAccount],
    ) -> Result<(), ClientError>;
}

/// Persistence for the synchronized product catalogue.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Replaces the stored catalogue for a bank.
    async fn replace_catalog(
        &self,
        bank_code: &str,
        products: Vec<ProductOffering>,
    ) -> Result<(), ClientError>;
}

/// Exports a client's transactions to the downstream warehouse.
#[async_trait]
pub trait TransactionExporter: Send + Sync {
    /// Exports transactions booked at or after `since`, returning how many
    /// records were written. Must be idempotent per `(client_id, since)`.
    async fn export_transactions(
        &self,
        client_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, ClientError>;
}

/// Gateway to the ML analysis service.
#[async_trait]
pub trait MlAnalysisGateway: Send + Sync {
    async fn trigger_analysis(&self, client_id: &str, request_id: &str)
        -> Result<(), ClientError>;
}

/// Fire-and-forget emission of domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), ClientError>;
}
