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

//! Product Sync Handler
//!
//! Replaces the stored product catalogue for one bank with the bank's
//! current offering. The replace is wholesale, so duplicate runs converge on
//! the same state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::{
    AuthTokenProvider, DomainEvent, EventPublisher, ProductCatalogClient, ProductRepository,
};
use crate::error::HandlerError;
use crate::models::ScheduledTask;
use crate::task::{task_types, TaskHandler};

/// Synchronizes one bank's product catalogue.
pub struct ProductSyncHandler {
    catalog: Arc<dyn ProductCatalogClient>,
    tokens: Arc<dyn AuthTokenProvider>,
    products: Arc<dyn ProductRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ProductSyncHandler {
    pub fn new(
        catalog: Arc<dyn ProductCatalogClient>,
        tokens: Arc<dyn AuthTokenProvider>,
        products: Arc<dyn ProductRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog,
            tokens,
            products,
            events,
        }
    }
}

#[async_trait]
impl TaskHandler for ProductSyncHandler {
    fn task_type(&self) -> &str {
        task_types::PRODUCT_SYNC
    }

    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let bank_code = task.payload_str("bank_code")?;

        let token = self.tokens.team_token().await?;
        let offerings = self.catalog.fetch_catalog(bank_code, &token).await?;
        let product_count = offerings.len();
        self.products.replace_catalog(bank_code, offerings).await?;

        info!(bank_code, product_count, "Product catalogue synchronized");

        let event = DomainEvent::ProductCatalogSynced {
            bank_code: bank_code.to_string(),
            product_count,
        };
        if let Err(e) = self.events.publish(event).await {
            warn!(bank_code, error = %e, "Event publication failed; ignoring");
        }

        Ok(())
    }
}
