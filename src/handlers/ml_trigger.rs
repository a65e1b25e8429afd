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

//! ML Trigger Handler
//!
//! Fans a client out to the ML analysis service. The `request_id` payload
//! field correlates the trigger with the resulting analysis; when absent,
//! one is generated, which keeps retried triggers distinguishable downstream.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{DomainEvent, EventPublisher, MlAnalysisGateway};
use crate::error::HandlerError;
use crate::models::ScheduledTask;
use crate::task::{task_types, TaskHandler};

/// Triggers ML analysis for one client.
pub struct MlTriggerHandler {
    gateway: Arc<dyn MlAnalysisGateway>,
    events: Arc<dyn EventPublisher>,
}

impl MlTriggerHandler {
    pub fn new(gateway: Arc<dyn MlAnalysisGateway>, events: Arc<dyn EventPublisher>) -> Self {
        Self { gateway, events }
    }
}

#[async_trait]
impl TaskHandler for MlTriggerHandler {
    fn task_type(&self) -> &str {
        task_types::ML_ANALYSIS
    }

    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError> {
        let client_id = task.payload_str("client_id")?;
        let request_id = match task.payload_str_opt("request_id")? {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        self.gateway.trigger_analysis(client_id, &request_id).await?;

        info!(client_id, request_id, "ML analysis triggered");

        let event = DomainEvent::AnalysisRequested {
            client_id: client_id.to_string(),
            request_id,
        };
        if let Err(e) = self.events.publish(event).await {
            warn!(client_id, error = %e, "Event publication failed; ignoring");
        }

        Ok(())
    }

    /// Trigger tasks are transient fan-out steps; completed rows are purged.
    fn delete_after_success(&self) -> bool {
        true
    }
}
