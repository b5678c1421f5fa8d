//! Schedule record — persisted execution state and bookkeeping.
//!
//! Every state-machine transition is a method on [`ScheduleRecord`].
//! Transitions are no-ops unless the record is in the expected source
//! state, and every forward transition first checks the execution limit
//! and the schedule's end date, short-circuiting to `Finished` when
//! either has been crossed. Keeping the machine here, free of IO, lets
//! the whole lifecycle be unit tested without a store or an executor.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::context::TriggerContext;
use crate::schedule::Schedule;
use crate::time::Timestamp;

/// Per-schedule lifecycle state, persisted 1:1 with the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Waiting for a trigger to reach its goal.
    Idle,
    /// Triggered, waiting out the schedule's delay.
    TimeDelayed,
    /// The prepare step is in flight.
    Preparing,
    /// Prepared, waiting for the readiness gate to open.
    WaitingConditions,
    /// The payload is executing.
    Executing,
    /// Waiting out the interval pause after an execution.
    Paused,
    /// Limit reached or expired; terminal until edited or deleted.
    Finished,
}

impl ExecutionState {
    /// All states a live schedule can be in.
    pub const NON_TERMINAL: [Self; 6] = [
        Self::Idle,
        Self::TimeDelayed,
        Self::Preparing,
        Self::WaitingConditions,
        Self::Executing,
        Self::Paused,
    ];

    /// States that indicate an interrupted pipeline after a process kill.
    pub const INTERRUPTIBLE: [Self; 3] =
        [Self::Preparing, Self::WaitingConditions, Self::Executing];

    /// Stable textual name, used for indexed storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TimeDelayed => "time_delayed",
            Self::Preparing => "preparing",
            Self::WaitingConditions => "waiting_conditions",
            Self::Executing => "executing",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "time_delayed" => Ok(Self::TimeDelayed),
            "preparing" => Ok(Self::Preparing),
            "waiting_conditions" => Ok(Self::WaitingConditions),
            "executing" => Ok(Self::Executing),
            "paused" => Ok(Self::Paused),
            "finished" => Ok(Self::Finished),
            other => Err(format!("unknown execution state: {other}")),
        }
    }
}

/// The durable unit the store owns: a schedule plus its execution state
/// and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub schedule: Schedule,
    pub state: ExecutionState,
    pub state_changed_at: Timestamp,
    /// Executions (and penalized prepares) so far.
    pub triggered_count: u32,
    /// Absolute wake time while in `TimeDelayed`.
    pub delayed_until: Option<Timestamp>,
    /// Context of the firing driving the current cycle.
    pub trigger_context: Option<TriggerContext>,
    /// Context of a firing that arrived mid-cycle; consumed on the next
    /// return to `Idle`. Later firings replace earlier ones.
    pub pending_context: Option<TriggerContext>,
}

impl ScheduleRecord {
    /// Fresh record in `Idle`.
    #[must_use]
    pub fn new(schedule: Schedule, now: Timestamp) -> Self {
        Self {
            schedule,
            state: ExecutionState::Idle,
            state_changed_at: now,
            triggered_count: 0,
            delayed_until: None,
            trigger_context: None,
            pending_context: None,
        }
    }

    /// Whether the schedule's end date has passed.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.schedule.end.is_some_and(|end| end <= now)
    }

    /// Whether the schedule is inside its time window.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        if self.is_expired(now) {
            return false;
        }
        self.schedule.start.is_none_or(|start| now >= start)
    }

    /// Whether the execution limit has been reached.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        self.triggered_count >= self.schedule.limit
    }

    /// Whether the record is in its terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state == ExecutionState::Finished
    }

    /// Whether a finished record has outlived its edit grace period and
    /// can be deleted.
    #[must_use]
    pub fn should_delete(&self, now: Timestamp) -> bool {
        if self.state != ExecutionState::Finished {
            return false;
        }
        match self.schedule.edit_grace_period {
            None => true,
            Some(grace) => now.signed_duration_since(self.state_changed_at) >= delta(grace),
        }
    }

    fn set_state(&mut self, state: ExecutionState, now: Timestamp) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_changed_at = now;
    }

    fn finished(&mut self, now: Timestamp) {
        self.set_state(ExecutionState::Finished, now);
        self.trigger_context = None;
        self.pending_context = None;
        self.delayed_until = None;
    }

    fn idle(&mut self, now: Timestamp) {
        self.set_state(ExecutionState::Idle, now);
        self.trigger_context = None;
        self.delayed_until = None;
    }

    fn paused(&mut self, now: Timestamp) {
        self.set_state(ExecutionState::Paused, now);
        self.trigger_context = None;
        self.delayed_until = None;
    }

    /// A trigger reached its goal.
    ///
    /// From `Idle` this starts a cycle: the record moves to
    /// `TimeDelayed` when the schedule carries a delay, `Preparing`
    /// otherwise. From any other state the context is stashed as the
    /// pending context for the next cycle.
    pub fn fired(&mut self, context: TriggerContext, now: Timestamp) {
        if self.state != ExecutionState::Idle {
            if !self.is_terminal() {
                self.pending_context = Some(context);
            }
            return;
        }

        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }

        self.trigger_context = Some(context);
        match self.schedule.delay {
            Some(delay) if !delay.is_zero() => {
                self.delayed_until = Some(add(now, delay));
                self.set_state(ExecutionState::TimeDelayed, now);
            }
            _ => self.set_state(ExecutionState::Preparing, now),
        }
    }

    /// The delay wait is over; move on to prepare.
    pub fn delay_elapsed(&mut self, now: Timestamp) {
        if self.state != ExecutionState::TimeDelayed {
            return;
        }
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.delayed_until = None;
        self.set_state(ExecutionState::Preparing, now);
    }

    /// Prepare resolved to continue; wait for the readiness gate.
    pub fn prepare_continued(&mut self, now: Timestamp) {
        if self.state != ExecutionState::Preparing {
            return;
        }
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.set_state(ExecutionState::WaitingConditions, now);
    }

    /// Prepare resolved to skip; the cycle ends with no bookkeeping.
    pub fn prepare_skipped(&mut self, now: Timestamp) {
        if self.state != ExecutionState::Preparing {
            return;
        }
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.idle(now);
    }

    /// Prepare resolved to penalize: the miss counts against the limit
    /// and the interval pause applies as if the schedule had executed.
    pub fn prepare_penalized(&mut self, now: Timestamp) {
        if self.state != ExecutionState::Preparing {
            return;
        }
        self.triggered_count += 1;
        self.after_consumed_execution(now);
    }

    /// Execution is starting.
    pub fn execution_started(&mut self, now: Timestamp) {
        if self.state != ExecutionState::WaitingConditions {
            return;
        }
        self.set_state(ExecutionState::Executing, now);
    }

    /// Execution completed; apply limit/interval bookkeeping.
    pub fn execution_finished(&mut self, now: Timestamp) {
        if self.state != ExecutionState::Executing {
            return;
        }
        self.triggered_count += 1;
        self.after_consumed_execution(now);
    }

    fn after_consumed_execution(&mut self, now: Timestamp) {
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
        } else if self.schedule.interval.is_some() {
            self.paused(now);
        } else {
            self.idle(now);
        }
    }

    /// The readiness gate said skip; the cycle ends with no bookkeeping.
    pub fn execution_skipped(&mut self, now: Timestamp) {
        if self.state != ExecutionState::WaitingConditions {
            return;
        }
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.idle(now);
    }

    /// The readiness gate invalidated the prepared data; prepare again
    /// with the same context.
    pub fn execution_invalidated(&mut self, now: Timestamp) {
        if self.state != ExecutionState::WaitingConditions {
            return;
        }
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.set_state(ExecutionState::Preparing, now);
    }

    /// The interval pause is over; re-arm.
    pub fn interval_elapsed(&mut self, now: Timestamp) {
        if self.state != ExecutionState::Paused {
            return;
        }
        if self.is_expired(now) {
            self.finished(now);
            return;
        }
        self.idle(now);
    }

    /// The end date passed; finish from wherever the pipeline was.
    pub fn expire(&mut self, now: Timestamp) {
        if self.is_terminal() {
            return;
        }
        self.finished(now);
    }

    /// The process died mid-pipeline. Reset to `Idle`, preserving the
    /// cycle's context as pending so it can be replayed. The execution
    /// count is untouched.
    pub fn interrupted(&mut self, now: Timestamp) {
        if !ExecutionState::INTERRUPTIBLE.contains(&self.state) {
            return;
        }
        if self.pending_context.is_none() {
            self.pending_context = self.trigger_context.take();
        }
        self.idle(now);
    }

    /// Consume the pending context, starting a new cycle when idle.
    /// Returns `true` when a cycle was started.
    pub fn replay_pending(&mut self, now: Timestamp) -> bool {
        if self.state != ExecutionState::Idle {
            return false;
        }
        let Some(context) = self.pending_context.take() else {
            return false;
        };
        self.fired(context, now);
        self.state != ExecutionState::Idle
    }

    /// Re-derive terminal state after an edit: finish when the (possibly
    /// new) limit or end date has been crossed, re-arm a finished record
    /// that the edit brought back under both.
    pub fn reevaluate(&mut self, now: Timestamp) {
        if self.is_over_limit() || self.is_expired(now) {
            self.finished(now);
        } else if self.state == ExecutionState::Finished {
            self.idle(now);
        }
    }
}

fn delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn add(ts: Timestamp, duration: Duration) -> Timestamp {
    ts.checked_add_signed(delta(duration))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}
