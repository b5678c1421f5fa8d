//! # cadence-app
//!
//! Application layer — the automation engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters and hosts implement:
//!   - `ScheduleStore` — transactional persistence for schedule records and trigger progress
//!   - `ExecutionDelegate` — prepare/ready/execute hooks around the payload
//!   - `AudienceEvaluator` — external identity/segment membership checks
//!   - `Clock` — injectable time source
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `EnvironmentBus` — typed broadcast channel for environment events
//!   - `DelayTimer` — single central timer tracking the nearest pending deadline
//! - Run the **trigger evaluator** (environment events → per-trigger progress → firings)
//! - Run the **automation engine** (the orchestrator owning the scheduling loop and the
//!   public schedule/cancel/edit/query API)
//!
//! ## Dependency rule
//! Depends on `cadence-domain` only (plus `tokio` for channels, timers, and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod engine;
pub mod evaluator;
pub mod event_bus;
pub mod ports;
pub mod timer;
