//! # cadence-domain
//!
//! Pure domain model for the cadence automation scheduling engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Schedules** (durable automation units: triggers + payload + scheduling metadata)
//! - Define **Triggers** (conditions with a numeric goal/progress that fire when satisfied)
//! - Define **Schedule records** (persisted execution state + bookkeeping, with every
//!   state-machine transition expressed as a method so the machine is testable without IO)
//! - Define **Environment events** (raw app/session/region/custom-event signals)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod context;
pub mod event;
pub mod record;
pub mod schedule;
pub mod trigger;
