//! Environment events and engine notifications.
//!
//! [`EnvironmentEvent`]s are the raw signals the host application feeds
//! into the engine (app lifecycle, custom analytics events, region
//! transitions, version changes). The trigger evaluator converts them
//! into per-trigger progress. [`ScheduleNotification`]s flow the other
//! way: the engine publishes them on a broadcast channel whenever a
//! schedule crosses an observable boundary (expired, cancelled, limit
//! reached, interrupted).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::schedule::Schedule;

/// A raw environment signal fed into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    /// The app finished launching.
    AppInit,
    /// The app moved to the foreground.
    Foreground,
    /// The app moved to the background.
    Background,
    /// A new user session started.
    SessionStarted { session_id: String },
    /// The app version changed since the last launch.
    VersionChanged { version: String },
    /// A named analytics event, optionally carrying a numeric value.
    CustomEvent {
        name: String,
        value: Option<f64>,
        properties: serde_json::Value,
    },
    /// A screen became visible.
    ScreenViewed { name: String },
    /// The device entered a geofenced region.
    RegionEntered { region_id: String },
    /// The device exited a geofenced region.
    RegionExited { region_id: String },
}

impl EnvironmentEvent {
    /// Snapshot of the event as a JSON payload.
    ///
    /// Used both for predicate evaluation and as the event data captured
    /// in a [`TriggerContext`](crate::context::TriggerContext).
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::AppInit => json!({}),
            Self::Foreground => json!({}),
            Self::Background => json!({}),
            Self::SessionStarted { session_id } => json!({"session_id": session_id}),
            Self::VersionChanged { version } => json!({"version": version}),
            Self::CustomEvent {
                name,
                value,
                properties,
            } => json!({"name": name, "value": value, "properties": properties}),
            Self::ScreenViewed { name } => json!({"name": name}),
            Self::RegionEntered { region_id } => json!({"region_id": region_id}),
            Self::RegionExited { region_id } => json!({"region_id": region_id}),
        }
    }
}

/// Observable schedule lifecycle changes published by the engine.
///
/// Consumed by zero or more subscribers; publishing never blocks and
/// succeeds even when nobody is listening.
#[derive(Debug, Clone)]
pub enum ScheduleNotification {
    /// A new schedule was accepted and persisted.
    NewSchedule(Schedule),
    /// The schedule's end date passed before it finished executing.
    Expired(Schedule),
    /// The schedule was cancelled, either directly or by a prepare step.
    Cancelled(Schedule),
    /// The schedule reached its execution limit.
    LimitReached(Schedule),
    /// The schedule was found mid-pipeline at startup and reset.
    ExecutionInterrupted(Schedule),
}
