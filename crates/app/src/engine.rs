//! Automation engine — the orchestrator owning the scheduling loop.
//!
//! The engine reacts to trigger firings and condition changes, drives
//! each schedule's state machine through the prepare/ready/execute
//! protocol with the external delegate, and exposes the public
//! schedule/cancel/edit/query API.
//!
//! All record mutations funnel through [`ScheduleStore::update`], which
//! serializes writers, so no two operations ever read-modify-write the
//! same row concurrently. Delegate calls (`prepare`, `execute`) run in
//! detached per-schedule tasks: a slow delegate stalls only its own
//! schedule. Payload execution itself is additionally serialized through
//! a single execution slot, because execution typically drives exclusive
//! UI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use cadence_domain::error::AutomationError;
use cadence_domain::event::{EnvironmentEvent, ScheduleNotification};
use cadence_domain::id::ScheduleId;
use cadence_domain::record::{ExecutionState, ScheduleRecord};
use cadence_domain::schedule::{MissBehavior, PayloadType, Schedule, ScheduleEdits};
use cadence_domain::time::Timestamp;

use crate::evaluator::TriggerEvaluator;
use crate::event_bus::EnvironmentBus;
use crate::ports::{
    AudienceEvaluator, Clock, ExecutionDelegate, PrepareResult, ReadyResult, ScheduleStore,
};
use crate::timer::DelayTimer;

/// Consecutive `Invalidate` prepare results tolerated before the cycle
/// is dropped, so a schedule cannot oscillate between prepare and
/// invalidate forever when external metadata never stabilizes.
const MAX_PREPARE_ATTEMPTS: u32 = 3;

const NOTIFICATION_CAPACITY: usize = 64;

/// The automation engine. Cheap to clone; all clones share state.
pub struct AutomationEngine<S, D, A, C> {
    inner: Arc<Inner<S, D, A, C>>,
}

impl<S, D, A, C> Clone for AutomationEngine<S, D, A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S, D, A, C> {
    store: S,
    delegate: D,
    audience: A,
    clock: C,
    evaluator: Mutex<TriggerEvaluator>,
    /// Prepared schedules waiting for the readiness gate.
    pending: Mutex<HashMap<ScheduleId, PendingExecution>>,
    conditions_changed: Notify,
    notifications: broadcast::Sender<ScheduleNotification>,
    /// Held for the duration of every payload execution.
    execution_slot: tokio::sync::Mutex<()>,
    paused: AtomicBool,
    timer: Mutex<Option<DelayTimer>>,
    prepare_tx: Mutex<Option<mpsc::UnboundedSender<ScheduleId>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Debug, Clone, Copy)]
struct PendingExecution {
    priority: i32,
    created_at: Timestamp,
}

impl<S, D, A, C> AutomationEngine<S, D, A, C>
where
    S: ScheduleStore + Send + Sync + 'static,
    D: ExecutionDelegate + Send + Sync + 'static,
    A: AudienceEvaluator + Send + Sync + 'static,
    C: Clock + 'static,
{
    /// Create an engine with injected collaborators. The engine is inert
    /// until [`start`](Self::start) is called.
    pub fn new(store: S, delegate: D, audience: A, clock: C) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                delegate,
                audience,
                clock,
                evaluator: Mutex::new(TriggerEvaluator::new()),
                pending: Mutex::new(HashMap::new()),
                conditions_changed: Notify::new(),
                notifications,
                execution_slot: tokio::sync::Mutex::new(()),
                paused: AtomicBool::new(false),
                timer: Mutex::new(None),
                prepare_tx: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to schedule lifecycle notifications.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<ScheduleNotification> {
        self.inner.notifications.subscribe()
    }

    /// Restore persisted state and attach to the environment bus.
    ///
    /// Interrupted schedules are reset to idle (with a notification),
    /// stale finished schedules are deleted, pending delay and interval
    /// wakes are re-armed, and the trigger mirror is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns a storage error if restoring persisted records fails.
    pub async fn start(&self, bus: &EnvironmentBus) -> Result<(), AutomationError> {
        let (timer, mut due_rx) = DelayTimer::spawn();
        self.inner.restore(&timer).await?;
        *self.inner.timer.lock().unwrap() = Some(timer);

        let (prepare_tx, mut prepare_rx) = mpsc::unbounded_channel();
        *self.inner.prepare_tx.lock().unwrap() = Some(prepare_tx);

        let mut tasks = Vec::new();

        let inner = Arc::clone(&self.inner);
        let mut events = BroadcastStream::new(bus.subscribe());
        tasks.push(tokio::spawn(async move {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => inner.handle_event(event).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "environment event stream lagged");
                    }
                }
            }
        }));

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            while let Some(id) = due_rx.recv().await {
                inner.handle_due(id).await;
            }
        }));

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            while let Some(id) = prepare_rx.recv().await {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    inner.run_prepare(id).await;
                });
            }
        }));

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            loop {
                inner.conditions_changed.notified().await;
                inner.process_pending().await;
            }
        }));

        self.inner.tasks.lock().unwrap().extend(tasks);
        Ok(())
    }

    /// Detach from event sources and stop all engine tasks.
    ///
    /// In-flight delegate calls are left to finish on their own; their
    /// results are discarded because the store update loop is gone.
    pub fn stop(&self) {
        for task in self.inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        *self.inner.timer.lock().unwrap() = None;
        *self.inner.prepare_tx.lock().unwrap() = None;
    }

    /// Halt `Preparing → Executing` advancement without losing trigger
    /// or delay progress.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Resume advancement and re-poll readiness.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.conditions_changed.notify_one();
    }

    /// Re-poll `is_ready` for all schedules waiting on conditions.
    /// Collaborators call this when app state, network reachability,
    /// display slots, or frequency-constraint state change.
    pub fn schedule_conditions_changed(&self) {
        self.inner.conditions_changed.notify_one();
    }

    /// Validate and persist a new schedule.
    ///
    /// Returns `false` when the store's schedule ceiling rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Validation`] for structurally invalid
    /// schedules, or a storage error from the store.
    #[tracing::instrument(skip(self, schedule), fields(schedule_id = %schedule.id))]
    pub async fn schedule(&self, schedule: Schedule) -> Result<bool, AutomationError> {
        schedule.validate()?;
        let record = ScheduleRecord::new(schedule, self.inner.clock.now());
        let saved = self.inner.store.save(record.clone()).await?;
        if saved {
            self.inner.evaluator.lock().unwrap().track(&record);
            self.inner
                .notify(ScheduleNotification::NewSchedule(record.schedule));
        }
        Ok(saved)
    }

    /// Persist a batch of schedules.
    ///
    /// Structurally invalid entries yield `None` in the result without
    /// affecting the others. When the store ceiling rejects the batch,
    /// nothing is written and every entry is `None`.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn schedule_multiple(
        &self,
        schedules: Vec<Schedule>,
    ) -> Result<Vec<Option<ScheduleId>>, AutomationError> {
        let now = self.inner.clock.now();
        let mut results = Vec::with_capacity(schedules.len());
        let mut records = Vec::new();
        for schedule in schedules {
            if schedule.validate().is_ok() {
                results.push(Some(schedule.id));
                records.push(ScheduleRecord::new(schedule, now));
            } else {
                tracing::warn!(schedule_id = %schedule.id, "rejecting invalid schedule in batch");
                results.push(None);
            }
        }
        if records.is_empty() {
            return Ok(results);
        }

        let saved = self.inner.store.save_all(records.clone()).await?;
        if !saved {
            tracing::warn!("schedule batch rejected, store ceiling would be exceeded");
            return Ok(results.iter().map(|_| None).collect());
        }

        for record in &records {
            self.inner.evaluator.lock().unwrap().track(record);
            self.inner
                .notify(ScheduleNotification::NewSchedule(record.schedule.clone()));
        }
        Ok(results)
    }

    /// Cancel a schedule. Returns `true` when it existed.
    ///
    /// An in-flight prepare or execute for the schedule is allowed to
    /// finish, but its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_schedule(&self, id: ScheduleId) -> Result<bool, AutomationError> {
        let deleted = self.inner.store.delete(id).await?;
        match deleted {
            Some(record) => {
                self.inner.forget(id);
                self.inner
                    .notify(ScheduleNotification::Cancelled(record.schedule));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancel every schedule in a group. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn cancel_group(&self, group: impl Into<String>) -> Result<usize, AutomationError> {
        let deleted = self.inner.store.delete_by_group(group.into()).await?;
        for record in &deleted {
            self.inner.forget(record.schedule.id);
            self.inner
                .notify(ScheduleNotification::Cancelled(record.schedule.clone()));
        }
        Ok(deleted.len())
    }

    /// Cancel every schedule. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn cancel_all(&self) -> Result<usize, AutomationError> {
        let deleted = self.inner.store.delete_all().await?;
        for record in &deleted {
            self.inner.forget(record.schedule.id);
            self.inner
                .notify(ScheduleNotification::Cancelled(record.schedule.clone()));
        }
        Ok(deleted.len())
    }

    /// Get a schedule by id. Finished schedules past their grace period
    /// are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, AutomationError> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .store
            .get(id)
            .await?
            .filter(|record| !record.should_delete(now))
            .map(|record| record.schedule))
    }

    /// Get all non-terminal schedules.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn get_schedules(&self) -> Result<Vec<Schedule>, AutomationError> {
        let records = self
            .inner
            .store
            .get_by_states(ExecutionState::NON_TERMINAL.to_vec())
            .await?;
        Ok(records.into_iter().map(|record| record.schedule).collect())
    }

    /// Get every schedule, including finished ones. Intended for audit
    /// and testing.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn get_all_schedules(&self) -> Result<Vec<Schedule>, AutomationError> {
        let records = self.inner.store.get_all().await?;
        Ok(records.into_iter().map(|record| record.schedule).collect())
    }

    /// Get all live schedules in a group.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn get_schedules_by_group(
        &self,
        group: impl Into<String>,
    ) -> Result<Vec<Schedule>, AutomationError> {
        let now = self.inner.clock.now();
        let records = self.inner.store.get_by_group(group.into()).await?;
        Ok(records
            .into_iter()
            .filter(|record| !record.should_delete(now))
            .map(|record| record.schedule)
            .collect())
    }

    /// Get all live schedules with the given payload type.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    pub async fn get_schedules_by_type(
        &self,
        payload_type: PayloadType,
    ) -> Result<Vec<Schedule>, AutomationError> {
        let now = self.inner.clock.now();
        let records = self.inner.store.get_by_type(payload_type).await?;
        Ok(records
            .into_iter()
            .filter(|record| !record.should_delete(now))
            .map(|record| record.schedule)
            .collect())
    }

    /// Apply a partial edit to a schedule.
    ///
    /// Returns `None` once the schedule is past its grace period. An
    /// edit that re-arms a finished schedule (higher limit, later end)
    /// moves it back to idle.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Validation`] when the edited schedule
    /// would violate invariants, or a storage error from the store.
    #[tracing::instrument(skip(self, edits))]
    pub async fn edit_schedule(
        &self,
        id: ScheduleId,
        edits: ScheduleEdits,
    ) -> Result<Option<Schedule>, AutomationError> {
        let now = self.inner.clock.now();
        let Some(current) = self.inner.store.get(id).await? else {
            return Ok(None);
        };
        if current.should_delete(now) {
            return Ok(None);
        }

        let mut candidate = current.schedule.clone();
        edits.apply(&mut candidate);
        candidate.validate()?;

        let updated = self
            .inner
            .store
            .update(id, move |record| {
                edits.apply(&mut record.schedule);
                record.reevaluate(now);
            })
            .await?;

        match updated {
            Some(record) => {
                self.inner.evaluator.lock().unwrap().track(&record);
                Ok(Some(record.schedule))
            }
            None => Ok(None),
        }
    }
}

enum PrepareOutcome {
    Done,
    Retry,
}

impl<S, D, A, C> Inner<S, D, A, C>
where
    S: ScheduleStore + Send + Sync + 'static,
    D: ExecutionDelegate + Send + Sync + 'static,
    A: AudienceEvaluator + Send + Sync + 'static,
    C: Clock + 'static,
{
    fn notify(&self, notification: ScheduleNotification) {
        let _ = self.notifications.send(notification);
    }

    fn forget(&self, id: ScheduleId) {
        self.evaluator.lock().unwrap().remove(id);
        self.pending.lock().unwrap().remove(&id);
        if let Some(timer) = self.timer.lock().unwrap().as_ref() {
            timer.cancel(id);
        }
    }

    fn request_prepare(&self, id: ScheduleId) {
        if let Some(tx) = self.prepare_tx.lock().unwrap().as_ref() {
            let _ = tx.send(id);
        }
    }

    fn wake_at(&self, id: ScheduleId, at: Timestamp) {
        if let Some(timer) = self.timer.lock().unwrap().as_ref() {
            timer.wake_at(id, at);
        }
    }

    fn add_pending(&self, record: &ScheduleRecord) {
        self.pending.lock().unwrap().insert(
            record.schedule.id,
            PendingExecution {
                priority: record.schedule.priority,
                created_at: record.schedule.created_at,
            },
        );
        self.conditions_changed.notify_one();
    }

    fn remove_pending(&self, id: ScheduleId) {
        self.pending.lock().unwrap().remove(&id);
    }

    /// Startup recovery: delete stale records, expire what ran out while
    /// the process was down, reset interrupted pipelines, re-arm wakes,
    /// and rebuild the trigger mirror.
    async fn restore(&self, timer: &DelayTimer) -> Result<(), AutomationError> {
        let now = self.clock.now();

        for record in self.store.get_all().await? {
            if record.should_delete(now) {
                self.store.delete(record.schedule.id).await?;
            }
        }

        for record in self.store.get_active_expired(now).await? {
            let updated = self
                .store
                .update(record.schedule.id, move |r| r.expire(now))
                .await?;
            if let Some(updated) = updated {
                self.notify(ScheduleNotification::Expired(updated.schedule));
            }
        }

        for record in self
            .store
            .get_by_states(ExecutionState::INTERRUPTIBLE.to_vec())
            .await?
        {
            let updated = self
                .store
                .update(record.schedule.id, move |r| r.interrupted(now))
                .await?;
            if let Some(updated) = updated {
                tracing::warn!(
                    schedule_id = %updated.schedule.id,
                    "schedule was interrupted by a process restart"
                );
                self.notify(ScheduleNotification::ExecutionInterrupted(updated.schedule));
            }
        }

        let records = self.store.get_all().await?;
        for record in &records {
            match record.state {
                ExecutionState::TimeDelayed => {
                    timer.wake_at(record.schedule.id, record.delayed_until.unwrap_or(now));
                }
                ExecutionState::Paused => {
                    // Wait out only the remaining interval.
                    let at = record
                        .schedule
                        .interval
                        .map_or(now, |interval| wake_time(record.state_changed_at, interval));
                    timer.wake_at(record.schedule.id, at);
                }
                _ => {}
            }
        }

        let states = self.store.get_trigger_states(None, None).await?;
        self.evaluator.lock().unwrap().restore(&records, &states);

        Ok(())
    }

    /// Feed one environment event through the trigger evaluator and act
    /// on the firings. Progress and firings are persisted atomically
    /// before any pipeline work starts.
    async fn handle_event(&self, event: EnvironmentEvent) {
        let now = self.clock.now();
        let outcome = { self.evaluator.lock().unwrap().process_event(&event, now) };
        if outcome.is_empty() {
            return;
        }

        let firings = outcome
            .firings
            .into_iter()
            .map(|firing| (firing.schedule_id, firing.context))
            .collect();
        match self
            .store
            .commit_event_batch(outcome.progress, firings, now)
            .await
        {
            Ok(updated) => {
                for record in updated {
                    self.dispatch(record).await;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to persist trigger firings");
            }
        }
    }

    /// A delay or interval wake came due.
    async fn handle_due(&self, id: ScheduleId) {
        let now = self.clock.now();
        let result = self
            .store
            .update(id, move |record| match record.state {
                ExecutionState::TimeDelayed => record.delay_elapsed(now),
                ExecutionState::Paused => {
                    record.interval_elapsed(now);
                    record.replay_pending(now);
                }
                _ => {}
            })
            .await;
        match result {
            Ok(Some(record)) => self.dispatch(record).await,
            Ok(None) => {}
            Err(err) => tracing::error!(schedule_id = %id, error = %err, "timer wake failed"),
        }
    }

    /// Drive the side effects of a freshly committed state.
    async fn dispatch(&self, record: ScheduleRecord) {
        self.evaluator.lock().unwrap().track(&record);
        let now = self.clock.now();
        match record.state {
            ExecutionState::TimeDelayed => {
                if let Some(at) = record.delayed_until {
                    self.wake_at(record.schedule.id, at);
                }
            }
            ExecutionState::Preparing => self.request_prepare(record.schedule.id),
            ExecutionState::WaitingConditions => self.add_pending(&record),
            ExecutionState::Paused => {
                let at = record
                    .schedule
                    .interval
                    .map_or(now, |interval| wake_time(record.state_changed_at, interval));
                self.wake_at(record.schedule.id, at);
            }
            ExecutionState::Finished => {
                if record.is_expired(now) {
                    self.notify(ScheduleNotification::Expired(record.schedule));
                } else if record.is_over_limit() {
                    self.notify(ScheduleNotification::LimitReached(record.schedule));
                }
            }
            ExecutionState::Idle | ExecutionState::Executing => {}
        }
    }

    /// Run the prepare step, re-running on `Invalidate` up to the retry
    /// cap. On exhaustion the cycle is dropped and the schedule returns
    /// to idle.
    async fn run_prepare(&self, id: ScheduleId) {
        for _ in 0..MAX_PREPARE_ATTEMPTS {
            match self.prepare_once(id).await {
                Ok(PrepareOutcome::Done) => return,
                Ok(PrepareOutcome::Retry) => {}
                Err(err) => {
                    tracing::error!(schedule_id = %id, error = %err, "prepare step failed");
                    return;
                }
            }
        }

        tracing::warn!(schedule_id = %id, "prepare invalidated too many times, dropping cycle");
        let now = self.clock.now();
        match self
            .store
            .update(id, move |record| {
                record.prepare_skipped(now);
                record.replay_pending(now);
            })
            .await
        {
            Ok(Some(record)) => self.dispatch(record).await,
            Ok(None) => {}
            Err(err) => tracing::error!(schedule_id = %id, error = %err, "prepare reset failed"),
        }
    }

    async fn prepare_once(&self, id: ScheduleId) -> Result<PrepareOutcome, AutomationError> {
        let Some(record) = self.store.get(id).await? else {
            // Cancelled while queued; nothing to discard.
            return Ok(PrepareOutcome::Done);
        };
        if record.state != ExecutionState::Preparing {
            return Ok(PrepareOutcome::Done);
        }

        let now = self.clock.now();
        if record.is_expired(now) {
            if let Some(updated) = self.store.update(id, move |r| r.expire(now)).await? {
                self.dispatch(updated).await;
            }
            return Ok(PrepareOutcome::Done);
        }
        if !record.is_active(now) {
            tracing::trace!(schedule_id = %id, "schedule not yet inside its window, dropping cycle");
            if let Some(updated) = self
                .store
                .update(id, move |r| {
                    r.prepare_skipped(now);
                })
                .await?
            {
                self.dispatch(updated).await;
            }
            return Ok(PrepareOutcome::Done);
        }

        let result = self.resolve_prepare(&record).await;
        tracing::debug!(schedule_id = %id, ?result, "prepare resolved");

        match result {
            PrepareResult::Cancel => {
                if let Some(deleted) = self.store.delete(id).await? {
                    self.forget(id);
                    self.notify(ScheduleNotification::Cancelled(deleted.schedule));
                }
                Ok(PrepareOutcome::Done)
            }
            PrepareResult::Invalidate => {
                self.persist_progress_reset(id, now).await?;
                Ok(PrepareOutcome::Retry)
            }
            PrepareResult::Continue => {
                if let Some(updated) = self
                    .store
                    .update(id, move |r| r.prepare_continued(now))
                    .await?
                {
                    self.dispatch(updated).await;
                }
                Ok(PrepareOutcome::Done)
            }
            PrepareResult::Skip => {
                if let Some(updated) = self
                    .store
                    .update(id, move |r| {
                        r.prepare_skipped(now);
                        r.replay_pending(now);
                    })
                    .await?
                {
                    self.dispatch(updated).await;
                }
                Ok(PrepareOutcome::Done)
            }
            PrepareResult::Penalize => {
                self.persist_progress_reset(id, now).await?;
                if let Some(updated) = self
                    .store
                    .update(id, move |r| {
                        r.prepare_penalized(now);
                        r.replay_pending(now);
                    })
                    .await?
                {
                    self.dispatch(updated).await;
                }
                Ok(PrepareOutcome::Done)
            }
        }
    }

    async fn persist_progress_reset(
        &self,
        id: ScheduleId,
        now: Timestamp,
    ) -> Result<(), AutomationError> {
        let zeroed = { self.evaluator.lock().unwrap().reset_progress(id) };
        if !zeroed.is_empty() {
            self.store.commit_event_batch(zeroed, Vec::new(), now).await?;
        }
        Ok(())
    }

    /// Audience gate first, then the delegate. A miss resolves to the
    /// audience's configured behavior without consulting the delegate;
    /// evaluator failures resolve to skip so transient identity errors
    /// cannot destroy schedules.
    async fn resolve_prepare(&self, record: &ScheduleRecord) -> PrepareResult {
        if let Some(audience) = &record.schedule.audience {
            match self.audience.evaluate(audience).await {
                Ok(true) => {}
                Ok(false) => {
                    return match audience.miss_behavior {
                        MissBehavior::Cancel => PrepareResult::Cancel,
                        MissBehavior::Skip => PrepareResult::Skip,
                        MissBehavior::Penalize => PrepareResult::Penalize,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        schedule_id = %record.schedule.id,
                        error = %err,
                        "audience evaluation failed, skipping cycle"
                    );
                    return PrepareResult::Skip;
                }
            }
        }
        self.delegate
            .prepare(&record.schedule, record.trigger_context.as_ref())
            .await
    }

    /// One readiness pass over the pending set, in ascending priority
    /// (ties by creation time). `NotReady` schedules stay queued for the
    /// next conditions-changed signal.
    async fn process_pending(&self) {
        let mut candidates: Vec<(PendingExecution, ScheduleId)> = {
            self.pending
                .lock()
                .unwrap()
                .iter()
                .map(|(id, pending)| (*pending, *id))
                .collect()
        };
        candidates.sort_by_key(|(pending, _)| (pending.priority, pending.created_at));

        for (_, id) in candidates {
            if self.paused.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) = self.attempt_execution(id).await {
                tracing::error!(schedule_id = %id, error = %err, "execution attempt failed");
                self.remove_pending(id);
            }
        }
    }

    async fn attempt_execution(&self, id: ScheduleId) -> Result<(), AutomationError> {
        let now = self.clock.now();
        let Some(record) = self.store.get(id).await? else {
            self.remove_pending(id);
            return Ok(());
        };
        if record.state != ExecutionState::WaitingConditions {
            self.remove_pending(id);
            return Ok(());
        }
        if record.is_expired(now) {
            self.remove_pending(id);
            if let Some(updated) = self.store.update(id, move |r| r.expire(now)).await? {
                self.dispatch(updated).await;
            }
            return Ok(());
        }
        if !record.is_active(now) {
            // Start window not open yet; re-polled on the next signal.
            return Ok(());
        }

        match self.delegate.is_ready(&record.schedule) {
            ReadyResult::NotReady => Ok(()),
            ReadyResult::Invalidate => {
                self.remove_pending(id);
                if let Some(updated) = self
                    .store
                    .update(id, move |r| r.execution_invalidated(now))
                    .await?
                {
                    self.dispatch(updated).await;
                }
                Ok(())
            }
            ReadyResult::Skip => {
                self.remove_pending(id);
                if let Some(updated) = self
                    .store
                    .update(id, move |r| {
                        r.execution_skipped(now);
                        r.replay_pending(now);
                    })
                    .await?
                {
                    self.dispatch(updated).await;
                }
                Ok(())
            }
            ReadyResult::Continue => {
                self.remove_pending(id);
                self.execute(id).await
            }
        }
    }

    async fn execute(&self, id: ScheduleId) -> Result<(), AutomationError> {
        let _slot = self.execution_slot.lock().await;

        let now = self.clock.now();
        let Some(record) = self
            .store
            .update(id, move |r| r.execution_started(now))
            .await?
        else {
            return Ok(());
        };
        if record.state != ExecutionState::Executing {
            return Ok(());
        }

        tracing::debug!(schedule_id = %id, "executing schedule");
        self.delegate.execute(&record.schedule).await;

        let now = self.clock.now();
        if let Some(updated) = self
            .store
            .update(id, move |r| {
                r.execution_finished(now);
                r.replay_pending(now);
            })
            .await?
        {
            self.dispatch(updated).await;
        }
        Ok(())
    }
}

fn wake_time(from: Timestamp, duration: std::time::Duration) -> Timestamp {
    chrono::TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}
