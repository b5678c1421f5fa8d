//! # cadence-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `ScheduleStore` port defined in `cadence-app`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain records and database rows
//! - Enforce the schedule-count ceiling inside write transactions
//!
//! ## Dependency rule
//! Depends on `cadence-app` (for the port trait) and `cadence-domain`
//! (for domain types). The `app` and `domain` crates must never
//! reference this adapter.

mod error;
mod pool;
mod schedule_store;

pub use error::StorageError;
pub use pool::{Config, DEFAULT_SCHEDULE_CEILING, Database};
pub use schedule_store::SqliteScheduleStore;
