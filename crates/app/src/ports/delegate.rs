//! Execution delegate port — the payload-specific hooks around execution.
//!
//! The engine owns *when* a schedule runs; the delegate owns *what*
//! running means. Delegate calls may take arbitrarily long (asset
//! pre-fetch, network lookups); the engine detaches the pending schedule
//! while a call is in flight so other schedules keep moving.

use std::future::Future;

use cadence_domain::context::TriggerContext;
use cadence_domain::schedule::Schedule;

/// Resolution of the prepare step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareResult {
    /// The schedule should continue towards execution.
    Continue,
    /// Skip this cycle with no bookkeeping change.
    Skip,
    /// Skip this cycle, but count it against the limit and apply the
    /// interval pause as if the schedule had executed.
    Penalize,
    /// The payload was built from stale data; prepare must run again.
    Invalidate,
    /// The schedule should be cancelled outright.
    Cancel,
}

/// Resolution of the readiness gate checked immediately before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyResult {
    /// Execute now.
    Continue,
    /// Not yet; re-poll on the next conditions-changed signal.
    NotReady,
    /// The prepared data is out of date; prepare again first.
    Invalidate,
    /// Skip this cycle (e.g. a frequency constraint was exceeded).
    Skip,
}

/// Payload-type-specific logic supplied by the host.
pub trait ExecutionDelegate {
    /// Pre-execution validation/build step for the schedule's payload.
    fn prepare(
        &self,
        schedule: &Schedule,
        context: Option<&TriggerContext>,
    ) -> impl Future<Output = PrepareResult> + Send;

    /// Cheap synchronous gate checked right before execution
    /// (app state, display coordinator, frequency limits).
    fn is_ready(&self, schedule: &Schedule) -> ReadyResult;

    /// Perform the payload (show the message, run the actions).
    fn execute(&self, schedule: &Schedule) -> impl Future<Output = ()> + Send;
}
