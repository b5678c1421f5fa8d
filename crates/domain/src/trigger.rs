//! Trigger — a condition with a numeric goal that fires when satisfied.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::EnvironmentEvent;
use crate::id::{ScheduleId, TriggerId};

/// The class of environment event a trigger accumulates progress from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// App finished launching.
    AppInit,
    /// App moved to the foreground.
    Foreground,
    /// App moved to the background.
    Background,
    /// A new user session started.
    ActiveSession,
    /// App version changed since the last launch.
    VersionUpdate,
    /// A custom event occurred; each occurrence counts once.
    CustomEventCount,
    /// A custom event occurred; its numeric value is the increment.
    CustomEventValue,
    /// A screen became visible.
    ScreenView,
    /// A geofenced region was entered.
    RegionEnter,
    /// A geofenced region was exited.
    RegionExit,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AppInit => "app_init",
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::ActiveSession => "active_session",
            Self::VersionUpdate => "version_update",
            Self::CustomEventCount => "custom_event_count",
            Self::CustomEventValue => "custom_event_value",
            Self::ScreenView => "screen_view",
            Self::RegionEnter => "region_enter",
            Self::RegionExit => "region_exit",
        };
        f.write_str(name)
    }
}

/// Optional filter applied to a matching event's payload before any
/// progress is consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPredicate {
    /// Matches when the payload field `key` equals `value`.
    Equals { key: String, value: serde_json::Value },
    /// Matches when the payload field `key` is a number greater than `value`.
    GreaterThan { key: String, value: f64 },
}

impl EventPredicate {
    /// Evaluate this predicate against an event payload.
    #[must_use]
    pub fn evaluate(&self, payload: &serde_json::Value) -> bool {
        match self {
            Self::Equals { key, value } => payload.get(key) == Some(value),
            Self::GreaterThan { key, value } => payload
                .get(key)
                .and_then(serde_json::Value::as_f64)
                .is_some_and(|actual| actual > *value),
        }
    }
}

/// A condition attached to a schedule.
///
/// Progress lives separately in [`TriggerState`] rows so it can be
/// persisted independently of the trigger definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub kind: TriggerKind,
    /// Accumulated progress at which the trigger fires.
    pub goal: f64,
    /// Optional filter over the firing event's payload.
    pub predicate: Option<EventPredicate>,
}

impl Trigger {
    /// Create a trigger with the given kind and goal.
    #[must_use]
    pub fn new(kind: TriggerKind, goal: f64) -> Self {
        Self {
            id: TriggerId::new(),
            kind,
            goal,
            predicate: None,
        }
    }

    /// Attach a predicate filter.
    #[must_use]
    pub fn with_predicate(mut self, predicate: EventPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidGoal`] when the goal is not positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.goal <= 0.0 {
            return Err(ValidationError::InvalidGoal);
        }
        Ok(())
    }

    /// Return the progress increment this trigger gains from an event,
    /// or `None` when the event does not match.
    ///
    /// Count-style triggers gain `1.0` per matching event; value-style
    /// triggers gain the event's numeric value (defaulting to `1.0` when
    /// the event carries none). Non-matching predicates consume nothing.
    #[must_use]
    pub fn match_weight(&self, event: &EnvironmentEvent) -> Option<f64> {
        let weight = match (self.kind, event) {
            (TriggerKind::AppInit, EnvironmentEvent::AppInit)
            | (TriggerKind::Foreground, EnvironmentEvent::Foreground)
            | (TriggerKind::Background, EnvironmentEvent::Background)
            | (TriggerKind::ActiveSession, EnvironmentEvent::SessionStarted { .. })
            | (TriggerKind::VersionUpdate, EnvironmentEvent::VersionChanged { .. })
            | (TriggerKind::ScreenView, EnvironmentEvent::ScreenViewed { .. })
            | (TriggerKind::RegionEnter, EnvironmentEvent::RegionEntered { .. })
            | (TriggerKind::RegionExit, EnvironmentEvent::RegionExited { .. })
            | (TriggerKind::CustomEventCount, EnvironmentEvent::CustomEvent { .. }) => 1.0,
            (TriggerKind::CustomEventValue, EnvironmentEvent::CustomEvent { value, .. }) => {
                value.unwrap_or(1.0)
            }
            _ => return None,
        };

        if let Some(predicate) = &self.predicate
            && !predicate.evaluate(&event.payload())
        {
            return None;
        }

        Some(weight)
    }
}

/// Persisted progress of one trigger towards its goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    pub schedule_id: ScheduleId,
    pub trigger_id: TriggerId,
    pub progress: f64,
}

impl TriggerState {
    /// Fresh state with zero progress.
    #[must_use]
    pub fn new(schedule_id: ScheduleId, trigger_id: TriggerId) -> Self {
        Self {
            schedule_id,
            trigger_id,
            progress: 0.0,
        }
    }
}
