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

//! Configuration for the scheduler service and driver.
//!
//! # Construction
//!
//! Use [`SchedulerConfig::builder()`] to override defaults:
//!
//! ```rust,ignore
//! let config = SchedulerConfig::builder()
//!     .poll_interval(Duration::from_secs(30))
//!     .retry_backoff_base(Duration::from_secs(60))
//!     .build();
//! ```

use std::time::Duration;

/// Configuration parameters controlling scheduler behavior.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    poll_interval: Duration,
    default_priority: i32,
    default_max_retries: i32,
    retry_backoff_base: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            default_priority: 5,
            default_max_retries: 3,
            retry_backoff_base: Duration::from_secs(300),
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// How often the driver processes due tasks.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Priority assigned to tasks scheduled without an explicit priority.
    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    /// Retry ceiling for tasks scheduled without an explicit ceiling.
    pub fn default_max_retries(&self) -> i32 {
        self.default_max_retries
    }

    /// Base delay of the linear retry backoff.
    ///
    /// A task that has failed `n` times becomes due again after
    /// `retry_backoff_base * n` — with the default base, 5, 10, then 15
    /// minutes. The base is configurable; the linear-in-attempt-count shape
    /// is not.
    pub fn retry_backoff_base(&self) -> Duration {
        self.retry_backoff_base
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    poll_interval: Option<Duration>,
    default_priority: Option<i32>,
    default_max_retries: Option<i32>,
    retry_backoff_base: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn default_priority(mut self, priority: i32) -> Self {
        self.default_priority = Some(priority);
        self
    }

    pub fn default_max_retries(mut self, max_retries: i32) -> Self {
        self.default_max_retries = Some(max_retries);
        self
    }

    pub fn retry_backoff_base(mut self, base: Duration) -> Self {
        self.retry_backoff_base = Some(base);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            default_priority: self.default_priority.unwrap_or(defaults.default_priority),
            default_max_retries: self
                .default_max_retries
                .unwrap_or(defaults.default_max_retries),
            retry_backoff_base: self
                .retry_backoff_base
                .unwrap_or(defaults.retry_backoff_base),
        }
    }
}
