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

//! Scheduled Task Model
//!
//! The unit of schedulable work. A task is created `Pending`, claimed by
//! exactly one instance (`Processing`), and resolved to `Completed`, deleted,
//! or — through the retry state machine — back to `Pending` or terminally
//! `Failed`.
//!
//! The payload is an open JSON object carrying handler-specific parameters.
//! It is immutable for the lifetime of a task: a retry re-reads the same
//! payload, and a self-reschedule creates a brand-new task with an updated
//! payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PayloadError;

/// Open key/value document attached to each task.
///
/// String keys, heterogeneous JSON values. Handlers narrow their expected
/// keys immediately on receipt via the `payload_*` accessors and fail fast
/// (retryably) on malformed payloads.
pub type TaskPayload = serde_json::Map<String, Value>;

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Eligible for claiming once `scheduled_time` has passed
    Pending,
    /// Claimed by exactly one instance; handler execution in flight
    Processing,
    /// Handler succeeded and the handler's retention policy keeps the row
    Completed,
    /// Retries exhausted; never picked up again
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Processing => "Processing",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TaskStatus::Pending),
            "Processing" => Some(TaskStatus::Processing),
            "Completed" => Some(TaskStatus::Completed),
            "Failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted scheduled task.
///
/// Only the scheduler service mutates tasks, and only through the DAL.
/// `scheduled_time` moves forward on retry and is otherwise fixed;
/// `locked_by`/`locked_at` identify the claiming instance and survive a
/// terminal failure for forensics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub task_type: String,
    pub task_name: String,
    pub payload: TaskPayload,
    pub scheduled_time: DateTime<Utc>,
    pub status: TaskStatus,
    /// Higher runs first among due tasks
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Returns the named payload field as a string slice.
    pub fn payload_str(&self, field: &'static str) -> Result<&str, PayloadError> {
        self.payload
            .get(field)
            .ok_or(PayloadError::MissingField(field))?
            .as_str()
            .ok_or(PayloadError::InvalidField {
                field,
                expected: "string",
            })
    }

    /// Returns the named payload field as a string slice, or `None` when the
    /// field is absent. A present-but-non-string value is still an error.
    pub fn payload_str_opt(&self, field: &'static str) -> Result<Option<&str>, PayloadError> {
        match self.payload.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or(PayloadError::InvalidField {
                    field,
                    expected: "string",
                }),
        }
    }

    /// Returns the named payload field as an integer.
    pub fn payload_i64(&self, field: &'static str) -> Result<i64, PayloadError> {
        self.payload
            .get(field)
            .ok_or(PayloadError::MissingField(field))?
            .as_i64()
            .ok_or(PayloadError::InvalidField {
                field,
                expected: "integer",
            })
    }

    /// Returns the named payload field as an integer, defaulting when the
    /// field is absent. A present-but-non-integer value is still an error.
    pub fn payload_i64_or(&self, field: &'static str, default: i64) -> Result<i64, PayloadError> {
        match self.payload.get(field) {
            None => Ok(default),
            Some(value) => value.as_i64().ok_or(PayloadError::InvalidField {
                field,
                expected: "integer",
            }),
        }
    }
}

/// Parameters for creating a new task.
///
/// The DAL assigns the id and bookkeeping timestamps; the task is always
/// inserted `Pending` with `retry_count = 0`.
#[derive(Debug, Clone)]
pub struct NewScheduledTask {
    pub task_type: String,
    pub task_name: String,
    pub payload: TaskPayload,
    pub scheduled_time: DateTime<Utc>,
    pub priority: i32,
    pub max_retries: i32,
}
