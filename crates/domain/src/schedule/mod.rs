//! Schedule — the durable unit of automation.
//!
//! A schedule pairs a payload with the conditions under which it runs:
//! triggers that arm it, an optional delay before preparation, a time
//! window, an execution limit with an optional pause interval between
//! executions, an audience predicate, and a priority used to order
//! simultaneous executions.

mod audience;
mod edits;
mod payload;

pub use audience::{Audience, MissBehavior};
pub use edits::ScheduleEdits;
pub use payload::{Payload, PayloadType};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, ValidationError};
use crate::id::ScheduleId;
use crate::time::Timestamp;
use crate::trigger::Trigger;

/// Upper bound on triggers per schedule.
pub const MAX_TRIGGERS: usize = 10;

/// A persisted automation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    /// Optional group used for bulk cancel/query.
    pub group: Option<String>,
    /// Ascending execution order; ties broken by creation time.
    pub priority: i32,
    /// Maximum number of successful executions.
    pub limit: u32,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    /// Pause between a trigger firing and the prepare step.
    pub delay: Option<Duration>,
    /// Pause after each execution before the schedule re-arms.
    pub interval: Option<Duration>,
    /// How long the schedule remains editable after finishing or expiring.
    pub edit_grace_period: Option<Duration>,
    pub audience: Option<Audience>,
    pub payload: Payload,
    /// Opaque key/value data, used to detect stale edits.
    pub metadata: serde_json::Value,
    /// References to external rate-limit rules, enforced by the
    /// execution delegate's readiness check.
    pub frequency_constraint_ids: Vec<String>,
    pub triggers: Vec<Trigger>,
    pub created_at: Timestamp,
}

impl Schedule {
    /// Create a builder for constructing a [`Schedule`].
    #[must_use]
    pub fn builder(payload: Payload) -> ScheduleBuilder {
        ScheduleBuilder::new(payload)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Validation`] when:
    /// - `triggers` is empty or has more than [`MAX_TRIGGERS`] entries
    /// - any trigger has a non-positive goal
    /// - `end` is not strictly after `start` when both are set
    /// - `limit` is zero
    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.triggers.is_empty() {
            return Err(ValidationError::NoTriggers.into());
        }
        if self.triggers.len() > MAX_TRIGGERS {
            return Err(ValidationError::TooManyTriggers.into());
        }
        for trigger in &self.triggers {
            trigger.validate()?;
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(ValidationError::InvalidTimeWindow.into());
            }
        }
        if self.limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Schedule`].
#[derive(Debug)]
pub struct ScheduleBuilder {
    id: Option<ScheduleId>,
    group: Option<String>,
    priority: i32,
    limit: u32,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    delay: Option<Duration>,
    interval: Option<Duration>,
    edit_grace_period: Option<Duration>,
    audience: Option<Audience>,
    payload: Payload,
    metadata: serde_json::Value,
    frequency_constraint_ids: Vec<String>,
    triggers: Vec<Trigger>,
    created_at: Option<Timestamp>,
}

impl ScheduleBuilder {
    fn new(payload: Payload) -> Self {
        Self {
            id: None,
            group: None,
            priority: 0,
            limit: 1,
            start: None,
            end: None,
            delay: None,
            interval: None,
            edit_grace_period: None,
            audience: None,
            payload,
            metadata: serde_json::Value::Null,
            frequency_constraint_ids: Vec::new(),
            triggers: Vec::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn id(mut self, id: ScheduleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn start(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn end(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn edit_grace_period(mut self, grace: Duration) -> Self {
        self.edit_grace_period = Some(grace);
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: Audience) -> Self {
        self.audience = Some(audience);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn frequency_constraint_id(mut self, id: impl Into<String>) -> Self {
        self.frequency_constraint_ids.push(id.into());
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`Schedule`].
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Validation`] if invariants fail.
    pub fn build(self) -> Result<Schedule, AutomationError> {
        let schedule = Schedule {
            id: self.id.unwrap_or_default(),
            group: self.group,
            priority: self.priority,
            limit: self.limit,
            start: self.start,
            end: self.end,
            delay: self.delay,
            interval: self.interval,
            edit_grace_period: self.edit_grace_period,
            audience: self.audience,
            payload: self.payload,
            metadata: self.metadata,
            frequency_constraint_ids: self.frequency_constraint_ids,
            triggers: self.triggers,
            created_at: self.created_at.unwrap_or_else(crate::time::now),
        };
        schedule.validate()?;
        Ok(schedule)
    }
}
