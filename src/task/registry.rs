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

//! Handler registry keyed by task type.
//!
//! Dispatch is by string lookup, not inheritance: the closed set of business
//! handlers registers here at startup and the driver iterates them each tick.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::TaskHandler;
use crate::error::RegistrationError;

/// String-keyed map of the task handlers available to this instance.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its declared task type.
    ///
    /// # Errors
    /// Returns [`RegistrationError::DuplicateTaskType`] if a handler for the
    /// same type is already present.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> Result<(), RegistrationError> {
        let task_type = handler.task_type().to_string();
        if self.handlers.contains_key(&task_type) {
            return Err(RegistrationError::DuplicateTaskType(task_type));
        }

        debug!(task_type, "Registered task handler");
        self.handlers.insert(task_type, handler);
        Ok(())
    }

    /// Looks up the handler for a task type.
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Iterates all registered handlers.
    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn TaskHandler>> {
        self.handlers.values()
    }

    /// All registered task types.
    pub fn task_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
