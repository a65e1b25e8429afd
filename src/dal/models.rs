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

//! SQLite row models for the task store.
//!
//! Diesel model definitions using SQLite-compatible types: UUIDs as BLOB
//! (`Vec<u8>`), timestamps as RFC3339 TEXT, the payload as JSON TEXT. These
//! are internal to the DAL and converted to/from domain types at its
//! boundary; a row that fails to decode surfaces as a [`StorageError`]
//! rather than a panic.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::scheduled_tasks;
use crate::error::StorageError;
use crate::models::{ScheduledTask, TaskStatus};

/// Converts a UUID to its 16-byte BLOB representation.
pub(crate) fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Decodes a UUID from a stored BLOB.
pub(crate) fn uuid_from_blob(bytes: &[u8]) -> Result<Uuid, StorageError> {
    Ok(Uuid::from_slice(bytes)?)
}

/// Encodes a timestamp as RFC3339 TEXT with fixed microsecond precision.
///
/// Fixed precision keeps the encoding width-stable, so SQLite's lexicographic
/// TEXT comparison agrees with chronological order in `WHERE` and `ORDER BY`
/// clauses.
pub(crate) fn timestamp_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Decodes a stored RFC3339 timestamp.
pub(crate) fn timestamp_from_text(s: &str) -> Result<DateTime<Utc>, StorageError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// A `scheduled_tasks` row as stored.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = scheduled_tasks)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteScheduledTask {
    pub id: Vec<u8>,
    pub task_type: String,
    pub task_name: String,
    pub payload: String,
    pub scheduled_time: String,
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub locked_by: Option<Vec<u8>>,
    pub locked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = scheduled_tasks)]
pub struct NewSqliteScheduledTask {
    pub id: Vec<u8>,
    pub task_type: String,
    pub task_name: String,
    pub payload: String,
    pub scheduled_time: String,
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteScheduledTask> for ScheduledTask {
    type Error = StorageError;

    fn try_from(row: SqliteScheduledTask) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse(&row.status)
            .ok_or_else(|| StorageError::InvalidStatus(row.status.clone()))?;

        Ok(ScheduledTask {
            id: uuid_from_blob(&row.id)?,
            task_type: row.task_type,
            task_name: row.task_name,
            payload: serde_json::from_str(&row.payload)?,
            scheduled_time: timestamp_from_text(&row.scheduled_time)?,
            status,
            priority: row.priority,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            last_error: row.last_error,
            locked_by: row.locked_by.as_deref().map(uuid_from_blob).transpose()?,
            locked_at: row
                .locked_at
                .as_deref()
                .map(timestamp_from_text)
                .transpose()?,
            created_at: timestamp_from_text(&row.created_at)?,
            updated_at: timestamp_from_text(&row.updated_at)?,
        })
    }
}

impl TryFrom<&ScheduledTask> for SqliteScheduledTask {
    type Error = StorageError;

    fn try_from(task: &ScheduledTask) -> Result<Self, Self::Error> {
        Ok(SqliteScheduledTask {
            id: uuid_to_blob(task.id),
            task_type: task.task_type.clone(),
            task_name: task.task_name.clone(),
            payload: serde_json::to_string(&task.payload)?,
            scheduled_time: timestamp_to_text(task.scheduled_time),
            status: task.status.as_str().to_string(),
            priority: task.priority,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            last_error: task.last_error.clone(),
            locked_by: task.locked_by.map(uuid_to_blob),
            locked_at: task.locked_at.map(timestamp_to_text),
            created_at: timestamp_to_text(task.created_at),
            updated_at: timestamp_to_text(task.updated_at),
        })
    }
}
