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

//! Transaction Export Handler
//!
//! Exports a client's transactions to the downstream warehouse. The export
//! window starts at the payload's `export_from` timestamp when present, and
//! defaults to the last 30 days otherwise. The exporter contract is
//! idempotent per `(client, since)`, so a retried export does not duplicate
//! records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::clients::{DomainEvent, EventPublisher, TransactionExporter};
use crate::error::{HandlerError, PayloadError};
use crate::models::ScheduledTask;
use crate::task::{task_types, TaskHandler};

/// Default export window when the payload carries no `export_from`.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Exports one client's transactions.
pub struct TransactionExportHandler {
    exporter: Arc<dyn TransactionExporter>,
    events: Arc<dyn EventPublisher>,
}

impl TransactionExportHandler {
    pub fn new(exporter: Arc<dyn TransactionExporter>, events: Arc<dyn EventPublisher>) -> Self {
        Self { exporter, events }
    }

    /// Resolves the export window start from the payload.
    fn export_from(task: &ScheduledTask) -> Result<DateTime<Utc>, PayloadError> {
        match task.payload_str_opt("export_from")? {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| PayloadError::InvalidField {
                    field: "export_from",
                    expected: "RFC3339 timestamp",
                }),
            None => Ok(Utc::now() - Duration::days(DEFAULT_WINDOW_DAYS)),
        }
    }
}

#[async_trait]
impl TaskHandler for TransactionExportHandler {
    fn task_type(&self) -> &str {
        task_types::TRANSACTION_EXPORT
    }

    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let client_id = task.payload_str("client_id")?;
        let since = Self::export_from(task)?;

        let exported = self.exporter.export_transactions(client_id, since).await?;

        info!(client_id, exported, since = %since, "Transactions exported");

        let event = DomainEvent::TransactionsExported {
            client_id: client_id.to_string(),
            exported,
        };
        if let Err(e) = self.events.publish(event).await {
            warn!(client_id, error = %e, "Event publication failed; ignoring");
        }

        Ok(())
    }
}
