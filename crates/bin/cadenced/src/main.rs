//! # cadenced — cadence automation daemon
//!
//! Composition root that wires the storage adapter, delegates, and
//! engine together and runs until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the schedule store (adapter)
//! - Construct the engine, injecting store/delegate/audience via port traits
//! - Attach the engine to the environment event bus and start it
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::future::Future;

use cadence_adapter_storage_sqlite_sqlx::{Config as DbConfig, SqliteScheduleStore};
use cadence_app::engine::AutomationEngine;
use cadence_app::event_bus::EnvironmentBus;
use cadence_app::ports::{AllowAllAudience, ExecutionDelegate, PrepareResult, ReadyResult, SystemClock};
use cadence_domain::context::TriggerContext;
use cadence_domain::event::EnvironmentEvent;
use cadence_domain::schedule::Schedule;
use tracing_subscriber::EnvFilter;

/// Delegate that logs each pipeline step and always proceeds. A real
/// host replaces this with message rendering / action running logic.
struct LoggingDelegate;

impl ExecutionDelegate for LoggingDelegate {
    fn prepare(
        &self,
        schedule: &Schedule,
        _context: Option<&TriggerContext>,
    ) -> impl Future<Output = PrepareResult> + Send {
        tracing::info!(schedule_id = %schedule.id, "preparing schedule");
        async { PrepareResult::Continue }
    }

    fn is_ready(&self, _schedule: &Schedule) -> ReadyResult {
        ReadyResult::Continue
    }

    fn execute(&self, schedule: &Schedule) -> impl Future<Output = ()> + Send {
        tracing::info!(schedule_id = %schedule.id, payload = ?schedule.payload, "executing schedule");
        async {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database.url.clone(),
        schedule_ceiling: config.engine.schedule_ceiling,
    }
    .build()
    .await?;
    let store =
        SqliteScheduleStore::with_ceiling(db.pool().clone(), config.engine.schedule_ceiling);

    // Event bus + engine
    let bus = EnvironmentBus::new(256);
    let engine = AutomationEngine::new(store, LoggingDelegate, AllowAllAudience, SystemClock);

    // Surface lifecycle notifications in the log.
    let mut notifications = engine.notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            tracing::info!(?notification, "schedule notification");
        }
    });

    engine.start(&bus).await?;
    tracing::info!("cadenced running, press ctrl-c to stop");

    // The daemon itself is an environment source for app lifecycle.
    bus.publish(EnvironmentEvent::AppInit);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    engine.stop();
    db.shutdown().await;

    Ok(())
}
