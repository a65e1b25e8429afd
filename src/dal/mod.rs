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

//! Data Access Layer for the task store.
//!
//! The DAL is the sole write path to the `scheduled_tasks` table. Business
//! handlers never touch it directly; they communicate success, failure, and
//! deletion preference back to the scheduler service, which drives these
//! operations.

pub mod models;
pub mod task;

pub use task::TaskDal;

use crate::database::Database;

/// Entry point to the data access layer.
///
/// Cheap to clone; each accessor returns a scoped DAL over the shared pool.
#[derive(Clone)]
pub struct Dal {
    pub(crate) database: Database,
}

impl Dal {
    /// Creates a new DAL over the given database pool.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Operations on the scheduled task table.
    pub fn scheduled_tasks(&self) -> TaskDal<'_> {
        TaskDal::new(self)
    }
}
