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

//! Scheduled task queries and the atomic claim.
//!
//! The claim is a single conditional `UPDATE ... WHERE id = ? AND status =
//! 'Pending'` — a row-level compare-and-swap at the storage layer, never a
//! read-then-write. SQLite serializes writers, so under concurrent instances
//! exactly one claimant sees an affected row count of 1.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::models::{
    timestamp_to_text, uuid_to_blob, NewSqliteScheduledTask, SqliteScheduledTask,
};
use super::Dal;
use crate::database::schema::scheduled_tasks;
use crate::error::StorageError;
use crate::models::{NewScheduledTask, ScheduledTask, TaskStatus};

/// Sets the per-connection busy timeout before a write.
///
/// Without it SQLite returns SQLITE_BUSY immediately when another pooled
/// connection holds the write lock; with it, competing writers queue for up
/// to five seconds instead.
fn set_busy_timeout(conn: &mut SqliteConnection) -> QueryResult<()> {
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(conn)
        .map(|_| ())
}

/// Data access for scheduled tasks.
pub struct TaskDal<'a> {
    dal: &'a Dal,
}

impl<'a> TaskDal<'a> {
    pub(crate) fn new(dal: &'a Dal) -> Self {
        Self { dal }
    }

    /// Inserts a new task with `Pending` status and `retry_count = 0`,
    /// returning the persisted domain task.
    pub async fn insert(&self, new_task: NewScheduledTask) -> Result<ScheduledTask, StorageError> {
        let conn = self.dal.database.get_connection().await?;

        let now = Utc::now();
        let row = NewSqliteScheduledTask {
            id: uuid_to_blob(Uuid::new_v4()),
            task_type: new_task.task_type,
            task_name: new_task.task_name,
            payload: serde_json::to_string(&new_task.payload)?,
            scheduled_time: timestamp_to_text(new_task.scheduled_time),
            status: TaskStatus::Pending.as_str().to_string(),
            priority: new_task.priority,
            retry_count: 0,
            max_retries: new_task.max_retries,
            created_at: timestamp_to_text(now),
            updated_at: timestamp_to_text(now),
        };

        let inserted: SqliteScheduledTask = conn
            .interact(move |conn| {
                set_busy_timeout(conn)?;
                diesel::insert_into(scheduled_tasks::table)
                    .values(&row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        inserted.try_into()
    }

    /// Retrieves a task by id.
    pub async fn get_by_id(&self, task_id: Uuid) -> Result<Option<ScheduledTask>, StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let id_blob = uuid_to_blob(task_id);

        let row: Option<SqliteScheduledTask> = conn
            .interact(move |conn| {
                scheduled_tasks::table
                    .find(id_blob)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(TryInto::try_into).transpose()
    }

    /// Returns all tasks that are `Pending` and due at `now`, ordered by
    /// priority descending, then scheduled time ascending — the
    /// oldest-most-urgent task within each priority class comes first.
    pub async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let now_text = timestamp_to_text(now);

        let rows: Vec<SqliteScheduledTask> = conn
            .interact(move |conn| {
                scheduled_tasks::table
                    .filter(scheduled_tasks::status.eq(TaskStatus::Pending.as_str()))
                    .filter(scheduled_tasks::scheduled_time.le(now_text))
                    .order((
                        scheduled_tasks::priority.desc(),
                        scheduled_tasks::scheduled_time.asc(),
                    ))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Atomically claims a task for the given instance.
    ///
    /// Transitions `Pending -> Processing` and records `locked_by`/`locked_at`
    /// in one conditional UPDATE. Returns `false` when another instance won
    /// the race or the task is no longer `Pending` — expected contention, not
    /// an error.
    pub async fn claim(
        &self,
        task_id: Uuid,
        claimant: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let id_blob = uuid_to_blob(task_id);
        let claimant_blob = uuid_to_blob(claimant);
        let now_text = timestamp_to_text(now);

        let updated = conn
            .interact(move |conn| {
                set_busy_timeout(conn)?;
                diesel::update(
                    scheduled_tasks::table
                        .filter(scheduled_tasks::id.eq(id_blob))
                        .filter(scheduled_tasks::status.eq(TaskStatus::Pending.as_str())),
                )
                .set((
                    scheduled_tasks::status.eq(TaskStatus::Processing.as_str()),
                    scheduled_tasks::locked_by.eq(Some(claimant_blob)),
                    scheduled_tasks::locked_at.eq(Some(now_text.clone())),
                    scheduled_tasks::updated_at.eq(now_text),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Persists the full current state of a task.
    ///
    /// `None` lock fields are written as NULL, so returning a task to
    /// `Pending` for retry clears its lock columns.
    pub async fn save(&self, task: &ScheduledTask) -> Result<(), StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let row = SqliteScheduledTask::try_from(task)?;
        let id_blob = row.id.clone();

        conn.interact(move |conn| {
            set_busy_timeout(conn)?;
            diesel::update(scheduled_tasks::table.find(id_blob))
                .set(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Deletes a task row, returning whether it existed.
    pub async fn delete(&self, task_id: Uuid) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let id_blob = uuid_to_blob(task_id);

        let deleted = conn
            .interact(move |conn| {
                set_busy_timeout(conn)?;
                diesel::delete(scheduled_tasks::table.find(id_blob)).execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(deleted > 0)
    }

    /// Counts tasks currently in the given status.
    pub async fn count_by_status(&self, status: TaskStatus) -> Result<i64, StorageError> {
        let conn = self.dal.database.get_connection().await?;

        let count: i64 = conn
            .interact(move |conn| {
                scheduled_tasks::table
                    .filter(scheduled_tasks::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Returns all tasks of the given type, most recently scheduled first.
    /// Primarily an observability surface for domain endpoints and tests.
    pub async fn find_by_type(&self, task_type: &str) -> Result<Vec<ScheduledTask>, StorageError> {
        let conn = self.dal.database.get_connection().await?;
        let task_type = task_type.to_string();

        let rows: Vec<SqliteScheduledTask> = conn
            .interact(move |conn| {
                scheduled_tasks::table
                    .filter(scheduled_tasks::task_type.eq(task_type))
                    .order(scheduled_tasks::scheduled_time.desc())
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
