//! Schedule store port — transactional persistence for schedule records.
//!
//! The store is the single shared mutable resource in the system. All
//! mutating operations are atomic with respect to concurrent callers
//! (single-writer semantics); reads are snapshot reads that may trail
//! in-flight writes. The engine funnels every state transition through
//! [`ScheduleStore::update`] so a record and its triggers are never torn.

use std::future::Future;

use cadence_domain::context::TriggerContext;
use cadence_domain::error::AutomationError;
use cadence_domain::id::ScheduleId;
use cadence_domain::record::{ExecutionState, ScheduleRecord};
use cadence_domain::schedule::PayloadType;
use cadence_domain::time::Timestamp;
use cadence_domain::trigger::{TriggerKind, TriggerState};

/// Persistence for [`ScheduleRecord`]s and their trigger progress.
pub trait ScheduleStore {
    /// Persist a new record.
    ///
    /// Returns `false` (writing nothing) when the configured schedule
    /// ceiling would be exceeded.
    fn save(
        &self,
        record: ScheduleRecord,
    ) -> impl Future<Output = Result<bool, AutomationError>> + Send;

    /// Persist a batch of new records, all-or-nothing with respect to
    /// the ceiling check (evaluated against the final count).
    fn save_all(
        &self,
        records: Vec<ScheduleRecord>,
    ) -> impl Future<Output = Result<bool, AutomationError>> + Send;

    /// Get a record by schedule identifier.
    fn get(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<ScheduleRecord>, AutomationError>> + Send;

    /// Get every record, including finished ones.
    fn get_all(&self) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Get all records in the given group.
    fn get_by_group(
        &self,
        group: String,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Get all records whose payload has the given type.
    fn get_by_type(
        &self,
        payload_type: PayloadType,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Get all records in any of the given states.
    fn get_by_states(
        &self,
        states: Vec<ExecutionState>,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Get all non-terminal records whose end date has passed.
    fn get_active_expired(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Get persisted trigger progress, optionally scoped to one schedule
    /// and/or one trigger kind. Only triggers of non-terminal schedules
    /// are returned.
    fn get_trigger_states(
        &self,
        schedule_id: Option<ScheduleId>,
        kind: Option<TriggerKind>,
    ) -> impl Future<Output = Result<Vec<TriggerState>, AutomationError>> + Send;

    /// Transactional read-modify-write of a single record.
    ///
    /// Returns the updated record, or `None` when the schedule no longer
    /// exists (in which case `f` is never called and nothing is written).
    fn update<F>(
        &self,
        id: ScheduleId,
        f: F,
    ) -> impl Future<Output = Result<Option<ScheduleRecord>, AutomationError>> + Send
    where
        F: FnOnce(&mut ScheduleRecord) + Send;

    /// Persist a batch of trigger-progress updates and apply the
    /// resulting firings to their records in a single transaction, so a
    /// crash mid-evaluation never double-counts or loses progress.
    ///
    /// Returns the records updated by the firings. Firings for schedules
    /// that no longer exist are dropped.
    fn commit_event_batch(
        &self,
        progress: Vec<TriggerState>,
        firings: Vec<(ScheduleId, TriggerContext)>,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Delete a record, returning it when it existed.
    fn delete(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<ScheduleRecord>, AutomationError>> + Send;

    /// Delete all records in a group, returning the deleted records.
    fn delete_by_group(
        &self,
        group: String,
    ) -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Delete every record, returning the deleted records.
    fn delete_all(&self)
    -> impl Future<Output = Result<Vec<ScheduleRecord>, AutomationError>> + Send;

    /// Number of stored records.
    fn count(&self) -> impl Future<Output = Result<usize, AutomationError>> + Send;
}
