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

//! Fixed-interval driver for the scheduler service.
//!
//! Each process instance runs one driver. On every tick the driver asks the
//! scheduler service to process due tasks for every registered handler.
//! Processing runs inline in the tick loop, so a slow cycle delays the next
//! tick instead of overlapping it — ticks are serialized per instance, while
//! cross-instance parallelism remains expected and safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::task::HandlerRegistry;

use super::SchedulerService;

/// Interval-driven trigger that feeds the scheduler service.
pub struct TaskDriver {
    service: Arc<SchedulerService>,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
    shutting_down: Arc<AtomicBool>,
}

impl TaskDriver {
    /// Creates a new driver over the given service and handler registry.
    pub fn new(
        service: Arc<SchedulerService>,
        registry: Arc<HandlerRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service,
            registry,
            poll_interval,
            shutdown: Arc::new(Notify::new()),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the tick loop until [`shutdown`](Self::shutdown) is called.
    ///
    /// A failing processing cycle is logged and isolated from the next
    /// scheduled tick.
    pub async fn run(&self) {
        info!(
            instance_id = %self.service.instance_id(),
            poll_interval_secs = self.poll_interval.as_secs(),
            handlers = self.registry.len(),
            "Starting task driver"
        );

        let mut interval = time::interval(self.poll_interval);
        // Skip missed ticks rather than bursting to catch up after a slow
        // cycle.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.shutting_down.load(Ordering::SeqCst) {
                        break;
                    }
                    self.run_cycle().await;
                }
                _ = self.shutdown.notified() => {
                    info!("Task driver shutting down");
                    break;
                }
            }
        }
    }

    /// Processes one tick: every registered handler gets a pass over the
    /// current backlog of due tasks.
    async fn run_cycle(&self) {
        debug!("Driver tick");
        for handler in self.registry.handlers() {
            if let Err(e) = self.service.process_due_tasks(handler.as_ref()).await {
                error!(
                    task_type = handler.task_type(),
                    error = %e,
                    "Processing cycle failed; continuing with next handler"
                );
            }
        }
    }

    /// Signals the driver to stop after the current cycle.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}
