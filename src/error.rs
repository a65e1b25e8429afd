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

//! Error types for the Copia task engine.
//!
//! Errors are layered the same way the crate is: [`StorageError`] for the data
//! access layer, [`SchedulerError`] for the engine surface, [`HandlerError`]
//! for business handlers, and [`ClientError`] for external collaborators.
//! Inside `process_due_tasks` every failure — storage or handler — feeds the
//! same retry bookkeeping, so the engine does not need to distinguish them.

use thiserror::Error;

/// Errors originating in the data access layer.
///
/// Storage errors are never retried inside the DAL; they propagate to the
/// caller, where the scheduler's per-task failure handling takes over.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to obtain or build a pooled database connection
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// Underlying Diesel/SQLite error
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A stored UUID blob did not decode to 16 bytes
    #[error("Corrupt stored UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// A stored timestamp was not valid RFC3339 text
    #[error("Corrupt stored timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    /// A stored status string did not match any known task status
    #[error("Unknown task status: {0}")]
    InvalidStatus(String),

    /// A stored payload document was not a valid JSON object
    #[error("Corrupt stored payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Errors surfaced by the scheduler service.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while registering task handlers.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Two handlers declared the same supported task type
    #[error("A handler for task type '{0}' is already registered")]
    DuplicateTaskType(String),
}

/// Errors raised while narrowing a task's open payload document.
///
/// Handlers validate their expected keys immediately on receipt; a malformed
/// payload fails fast as a retryable handler error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Missing required payload field '{0}'")]
    MissingField(&'static str),

    #[error("Payload field '{field}' is not a valid {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Errors raised by external collaborators (bank APIs, token provider,
/// domain persistence, event publication).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Bank API error: {0}")]
    BankApi(String),

    #[error("Auth token error: {0}")]
    Token(String),

    #[error("Domain persistence error: {0}")]
    Store(String),

    #[error("Event publication error: {0}")]
    Publish(String),
}

/// Failure of a single task handler invocation.
///
/// Any `HandlerError` returned from [`crate::TaskHandler::handle`] is
/// interpreted by the engine as a retryable failure until the task's
/// `max_retries` is exhausted, after which the task is terminally `Failed`.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// A self-rescheduling handler failed to enqueue its follow-up task
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
