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

//! Task handler contract and registry.
//!
//! A handler binds one task type to domain logic. The engine claims a due
//! task, looks up the handler for its type, and invokes it; the handler's
//! outcome drives the task's resolution. Because claim failures, crashes
//! between claim and commit, and retries all create at-least-once delivery,
//! handlers must be idempotent or tolerant of duplicate side effects.

pub mod registry;

pub use registry::HandlerRegistry;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::models::ScheduledTask;

/// Well-known task type tags used by the platform's business workflows.
pub mod task_types {
    pub const BALANCE_UPDATE: &str = "BALANCE_UPDATE";
    pub const BANK_CONSENT_MONITORING: &str = "BANK_CONSENT_MONITORING";
    pub const PRODUCT_SYNC: &str = "PRODUCT_SYNC";
    pub const TRANSACTION_EXPORT: &str = "TRANSACTION_EXPORT";
    pub const ML_ANALYSIS: &str = "ML_ANALYSIS";
}

/// Domain logic bound to a single task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The single `task_type` this handler processes. The engine guarantees
    /// `handle` only ever receives tasks whose type equals this value.
    fn task_type(&self) -> &str;

    /// Executes one claimed task.
    ///
    /// Returning an error routes the task through the retry state machine:
    /// back to `Pending` with backoff while attempts remain, terminally
    /// `Failed` once `max_retries` is reached.
    async fn handle(&self, task: &ScheduledTask) -> Result<(), HandlerError>;

    /// Whether a successfully completed task row should be purged rather
    /// than retained as `Completed`.
    ///
    /// Short-lived polling steps delete themselves to avoid table growth;
    /// recurring business operations are kept for auditability.
    fn delete_after_success(&self) -> bool {
        false
    }
}
