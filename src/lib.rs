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

//! # Copia
//!
//! Copia is the scheduled task engine behind a financial-aggregation platform.
//! Every asynchronous workflow in the platform — periodic balance refresh,
//! bank-consent approval polling, product catalogue synchronization,
//! transaction export, and ML-analysis fan-out — runs as a task persisted in a
//! shared relational store and executed by whichever service instance claims
//! it first.
//!
//! The engine provides:
//!
//! - A durable task table that is both the work queue and the locking
//!   substrate. Claiming a task is a single atomic conditional `UPDATE`, so
//!   multiple competing instances get at-most-one-active-executor-per-task
//!   semantics without any external lock service.
//! - A retry state machine with linear backoff: a failed task returns to
//!   `Pending` with its schedule pushed forward by `backoff_base * attempt`,
//!   until `max_retries` is exhausted and it lands in `Failed`.
//! - A [`TaskHandler`] contract that lets independent business workflows plug
//!   into the same engine, including the self-rescheduling polling idiom used
//!   by the consent-approval workflow.
//!
//! Delivery is at-least-once; handlers must be idempotent or tolerant of
//! duplicate side effects.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use copia::{Database, Dal, HandlerRegistry, SchedulerConfig, SchedulerService, TaskDriver};
//! use std::sync::Arc;
//!
//! let database = Database::new("copia.db", 5)?;
//! database.initialize_schema().await?;
//!
//! let service = Arc::new(SchedulerService::new(
//!     Dal::new(database),
//!     SchedulerConfig::default(),
//! ));
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(Arc::new(my_handler))?;
//!
//! let driver = TaskDriver::new(service, Arc::new(registry), SchedulerConfig::default().poll_interval());
//! driver.run().await;
//! ```

pub mod clients;
pub mod dal;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod scheduler;
pub mod task;

pub use clients::{
    AccountRepository, ActiveConsent, AuthTokenProvider, BankAccount, BankApiClient,
    ConsentRepository, ConsentStatus, ConsentStatusResponse, DomainEvent, EventPublisher,
    MlAnalysisGateway, ProductCatalogClient, ProductOffering, ProductRepository,
    TransactionExporter,
};
pub use dal::Dal;
pub use database::Database;
pub use error::{
    ClientError, HandlerError, PayloadError, RegistrationError, SchedulerError, StorageError,
};
pub use handlers::{
    BalanceUpdateHandler, ConsentMonitoringHandler, MlTriggerHandler, ProductSyncHandler,
    TransactionExportHandler,
};
pub use models::{NewScheduledTask, ScheduledTask, TaskPayload, TaskStatus};
pub use scheduler::{SchedulerConfig, SchedulerService, TaskDriver};
pub use task::{task_types, HandlerRegistry, TaskHandler};

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber for the engine.
///
/// Honors `RUST_LOG` when set; otherwise falls back to the provided default
/// filter (or `info`). Safe to call more than once — subsequent calls are
/// no-ops, which keeps test binaries from panicking on double initialization.
pub fn init_logging(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or("info")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
