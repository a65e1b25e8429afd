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

//! Database connection management for the SQLite task store.
//!
//! Provides an async connection pool built on `deadpool-diesel`. The pool is
//! cheap to clone and thread-safe; every engine component that touches the
//! store goes through [`Database::get_connection`].
//!
//! SQLite accepts either a file path or `:memory:` style URLs:
//!
//! ```rust,ignore
//! use copia::Database;
//!
//! let db = Database::new("path/to/copia.db", 10)?;
//! db.initialize_schema().await?;
//! ```

use deadpool_diesel::sqlite::{Connection, Manager, Pool, Runtime};
use diesel::prelude::*;
use tracing::{debug, info};

use crate::error::StorageError;

/// Environment variable consulted by [`Database::from_env`].
const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Async connection pool over the SQLite task store.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    database_url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("database_url", &self.database_url)
            .finish()
    }
}

impl Database {
    /// Creates a new connection pool for the given SQLite database.
    ///
    /// # Arguments
    /// * `database_url` - File path, `:memory:`, or `file:` URI
    /// * `pool_size` - Maximum number of pooled connections
    pub fn new(database_url: &str, pool_size: usize) -> Result<Self, StorageError> {
        let manager = Manager::new(database_url, Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        info!(database_url, pool_size, "Created SQLite connection pool");

        Ok(Self {
            pool,
            database_url: database_url.to_string(),
        })
    }

    /// Creates a pool from the `DATABASE_URL` environment variable,
    /// loading a `.env` file first if one is present.
    pub fn from_env(pool_size: usize) -> Result<Self, StorageError> {
        dotenvy::dotenv().ok();
        let url = std::env::var(DATABASE_URL_VAR)
            .map_err(|_| StorageError::ConnectionPool(format!("{} is not set", DATABASE_URL_VAR)))?;
        Self::new(&url, pool_size)
    }

    /// Checks out a pooled connection.
    pub async fn get_connection(&self) -> Result<Connection, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }

    /// The connection URL this pool was created with.
    pub fn url(&self) -> &str {
        &self.database_url
    }

    /// Creates the task store schema if it does not already exist.
    ///
    /// Idempotent; every instance runs this at startup, so concurrent
    /// deployments converge on the same schema without coordination. Also
    /// switches the database to WAL so readers do not block the single
    /// writer.
    pub async fn initialize_schema(&self) -> Result<(), StorageError> {
        debug!("Initializing task store schema");
        let conn = self.get_connection().await?;

        conn.interact(|conn| {
            diesel::sql_query("PRAGMA journal_mode = WAL").execute(conn)?;
            diesel::sql_query(
                r#"
                CREATE TABLE IF NOT EXISTS scheduled_tasks (
                    id BLOB PRIMARY KEY NOT NULL,
                    task_type TEXT NOT NULL,
                    task_name TEXT NOT NULL,
                    payload TEXT NOT NULL DEFAULT '{}',
                    scheduled_time TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'Pending',
                    priority INTEGER NOT NULL DEFAULT 5,
                    retry_count INTEGER NOT NULL DEFAULT 0,
                    max_retries INTEGER NOT NULL DEFAULT 3,
                    last_error TEXT,
                    locked_by BLOB,
                    locked_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
            )
            .execute(conn)?;
            diesel::sql_query(
                "CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_due \
                 ON scheduled_tasks (status, scheduled_time)",
            )
            .execute(conn)?;
            Ok::<_, diesel::result::Error>(())
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!("Task store schema ready");
        Ok(())
    }
}
