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

//! Scheduler Service
//!
//! Creates tasks and runs the claim-execute-resolve cycle. Each service
//! instance holds a stable, process-wide `instance_id` used as the claimant
//! identity for all of its claim attempts, so operators can see which
//! instance holds a stuck lock.
//!
//! Failure handling is per task: one task's failure never aborts processing
//! of its siblings in the same batch, and storage failures inside the
//! claim-execute-resolve sequence feed the same retry bookkeeping as handler
//! failures.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dal::Dal;
use crate::error::SchedulerError;
use crate::models::{NewScheduledTask, ScheduledTask, TaskPayload, TaskStatus};
use crate::task::TaskHandler;

use super::SchedulerConfig;

/// The task scheduling engine.
pub struct SchedulerService {
    dal: Dal,
    config: SchedulerConfig,
    instance_id: Uuid,
}

impl SchedulerService {
    /// Creates a new scheduler service with a randomly generated instance id.
    pub fn new(dal: Dal, config: SchedulerConfig) -> Self {
        let instance_id = Uuid::new_v4();
        info!(%instance_id, "Created scheduler service");

        Self {
            dal,
            config,
            instance_id,
        }
    }

    /// The claimant identity this instance uses for all claim attempts.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn dal(&self) -> &Dal {
        &self.dal
    }

    /// Creates and persists a new `Pending` task with default priority and
    /// retry ceiling.
    ///
    /// No deduplication is performed: repeated calls enqueue independent
    /// tasks, and callers relying on single execution must be idempotent at
    /// the handler level. The caller gets the persisted task back as soon as
    /// it is `Pending` — it is never blocked on eventual execution.
    pub async fn schedule_task(
        &self,
        task_type: impl Into<String>,
        task_name: impl Into<String>,
        payload: TaskPayload,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledTask, SchedulerError> {
        self.schedule_task_with(
            task_type,
            task_name,
            payload,
            scheduled_time,
            self.config.default_priority(),
            self.config.default_max_retries(),
        )
        .await
    }

    /// Creates and persists a new `Pending` task with explicit priority and
    /// retry ceiling.
    pub async fn schedule_task_with(
        &self,
        task_type: impl Into<String>,
        task_name: impl Into<String>,
        payload: TaskPayload,
        scheduled_time: DateTime<Utc>,
        priority: i32,
        max_retries: i32,
    ) -> Result<ScheduledTask, SchedulerError> {
        let task = self
            .dal
            .scheduled_tasks()
            .insert(NewScheduledTask {
                task_type: task_type.into(),
                task_name: task_name.into(),
                payload,
                scheduled_time,
                priority,
                max_retries,
            })
            .await?;

        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            task_name = %task.task_name,
            scheduled_time = %task.scheduled_time,
            "Scheduled task"
        );

        Ok(task)
    }

    /// Processes all currently due tasks that match the given handler's type.
    ///
    /// For each due task: skip on type mismatch, attempt the atomic claim,
    /// and on a successful claim run the handler and resolve the outcome.
    /// Claim losses are expected contention and logged at debug only. A
    /// failing task is isolated: the loop continues with the remaining due
    /// tasks.
    pub async fn process_due_tasks(&self, handler: &dyn TaskHandler) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let due = self.dal.scheduled_tasks().find_due(now).await?;

        if due.is_empty() {
            return Ok(());
        }

        debug!(
            due = due.len(),
            task_type = handler.task_type(),
            "Processing due tasks"
        );

        for task in due {
            if task.task_type != handler.task_type() {
                // Another driver invocation bound to the matching handler
                // will pick this one up.
                continue;
            }

            let task_id = task.id;
            if let Err(e) = self.run_one(handler, task).await {
                error!(%task_id, error = %e, "Task processing cycle failed");
            }
        }

        Ok(())
    }

    /// Runs the claim-execute-resolve sequence for a single task.
    async fn run_one(
        &self,
        handler: &dyn TaskHandler,
        mut task: ScheduledTask,
    ) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let claimed = self
            .dal
            .scheduled_tasks()
            .claim(task.id, self.instance_id, now)
            .await?;

        if !claimed {
            debug!(task_id = %task.id, "Lost claim race; skipping");
            return Ok(());
        }

        // Mirror the claim in the in-memory copy so the handler and the
        // failure path both see the claimed state.
        task.status = TaskStatus::Processing;
        task.locked_by = Some(self.instance_id);
        task.locked_at = Some(now);

        debug!(
            task_id = %task.id,
            task_name = %task.task_name,
            attempt = task.retry_count + 1,
            "Claimed task"
        );

        match handler.handle(&task).await {
            Ok(()) => {
                if let Err(e) = self.resolve_success(&task, handler.delete_after_success()).await {
                    // A storage failure after a successful execution still
                    // drives the retry bookkeeping; the handler contract is
                    // at-least-once.
                    self.record_failure(task, &e.to_string()).await?;
                }
            }
            Err(e) => {
                self.record_failure(task, &e.to_string()).await?;
            }
        }

        Ok(())
    }

    /// Resolves a successfully handled task per the handler's retention
    /// policy: purge the row, or keep it as `Completed`.
    async fn resolve_success(
        &self,
        task: &ScheduledTask,
        delete_after_success: bool,
    ) -> Result<(), SchedulerError> {
        if delete_after_success {
            self.dal.scheduled_tasks().delete(task.id).await?;
            debug!(task_id = %task.id, "Task completed and purged");
            return Ok(());
        }

        let mut completed = task.clone();
        completed.status = TaskStatus::Completed;
        completed.updated_at = Utc::now();
        self.dal.scheduled_tasks().save(&completed).await?;
        debug!(task_id = %task.id, "Task completed");
        Ok(())
    }

    /// The retry/failure state machine.
    ///
    /// Increments `retry_count`; while attempts remain, the task returns to
    /// `Pending` with cleared locks and a schedule pushed forward by the
    /// linear backoff. Once `retry_count` reaches `max_retries` the task is
    /// terminally `Failed`, keeping its lock fields for forensics.
    async fn record_failure(
        &self,
        mut task: ScheduledTask,
        message: &str,
    ) -> Result<(), SchedulerError> {
        let now = Utc::now();
        task.retry_count += 1;
        task.last_error = Some(message.to_string());
        task.updated_at = now;

        if task.retry_count >= task.max_retries {
            task.status = TaskStatus::Failed;
            error!(
                task_id = %task.id,
                task_name = %task.task_name,
                retries = task.retry_count,
                error = message,
                "Task failed terminally; retries exhausted"
            );
        } else {
            let delay = self.backoff(task.retry_count);
            task.status = TaskStatus::Pending;
            task.locked_by = None;
            task.locked_at = None;
            task.scheduled_time = now + delay;
            warn!(
                task_id = %task.id,
                task_name = %task.task_name,
                attempt = task.retry_count,
                retry_in_secs = delay.num_seconds(),
                error = message,
                "Task failed; scheduled for retry"
            );
        }

        self.dal.scheduled_tasks().save(&task).await?;
        Ok(())
    }

    /// Linear backoff: `retry_backoff_base * retry_count`.
    fn backoff(&self, retry_count: i32) -> ChronoDuration {
        let base_secs = self.config.retry_backoff_base().as_secs() as i64;
        ChronoDuration::seconds(base_secs * retry_count as i64)
    }
}
