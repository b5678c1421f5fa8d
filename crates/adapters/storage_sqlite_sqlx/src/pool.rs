//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StorageError;

/// Default ceiling on stored schedules.
pub const DEFAULT_SCHEDULE_CEILING: usize = 1000;

/// Configuration for the `SQLite` storage adapter.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:cadence.db` or `sqlite::memory:`).
    pub database_url: String,
    /// Maximum number of schedules the store will accept.
    pub schedule_ceiling: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:cadence.db?mode=rwc".to_string(),
            schedule_ceiling: DEFAULT_SCHEDULE_CEILING,
        }
    }
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self.database_url).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and run migrations.
    ///
    /// The pool is capped at a single connection: writes are serialized
    /// anyway, and `sqlite::memory:` databases are per-connection.
    async fn initialize(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for in-flight operations to finish.
    /// Used by tests and orderly teardown.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}
