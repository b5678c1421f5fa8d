//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AutomationError`] via `#[from]`. Storage adapters wrap their
//! backend-specific errors behind the boxed `Storage` variant so the
//! domain and application layers never name a concrete database crate.

use crate::id::ScheduleId;

/// Top-level error for the automation engine.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced schedule does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations, rejected before anything is persisted.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A schedule must carry at least one trigger.
    #[error("schedule has no triggers")]
    NoTriggers,

    /// A schedule may carry at most ten triggers.
    #[error("schedule has more than {max} triggers", max = crate::schedule::MAX_TRIGGERS)]
    TooManyTriggers,

    /// `end` must be strictly after `start` when both are set.
    #[error("schedule end is not after start")]
    InvalidTimeWindow,

    /// `limit` must be at least one.
    #[error("schedule limit is zero")]
    ZeroLimit,

    /// Trigger goals must be positive.
    #[error("trigger goal is not positive")]
    InvalidGoal,
}

/// A lookup failed for a schedule that is not in the store.
#[derive(Debug, thiserror::Error)]
#[error("schedule {id} not found")]
pub struct NotFoundError {
    /// The identifier that failed to resolve.
    pub id: ScheduleId,
}
