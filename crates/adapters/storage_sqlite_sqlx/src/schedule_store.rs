//! `SQLite` implementation of [`ScheduleStore`].
//!
//! Each schedule record is stored as one row: the full record as JSON
//! plus denormalized columns (group, state, payload type, end date) for
//! indexed scans. Trigger progress lives in its own table so the
//! evaluator can persist progress without rewriting records. Every
//! mutating operation runs in a transaction; the ceiling check happens
//! inside the same transaction as the insert.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, Sqlite, SqlitePool, Transaction};

use cadence_app::ports::ScheduleStore;
use cadence_domain::context::TriggerContext;
use cadence_domain::error::AutomationError;
use cadence_domain::id::{ScheduleId, TriggerId};
use cadence_domain::record::{ExecutionState, ScheduleRecord};
use cadence_domain::schedule::PayloadType;
use cadence_domain::time::Timestamp;
use cadence_domain::trigger::{TriggerKind, TriggerState};

use crate::error::StorageError;
use crate::pool::DEFAULT_SCHEDULE_CEILING;

fn fmt_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

struct Wrapper(ScheduleRecord);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ScheduleRecord> {
        value.map(|w| w.0)
    }

    fn unwrap_all(rows: Vec<Self>) -> Vec<ScheduleRecord> {
        rows.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let json: String = row.try_get("record_json")?;
        let record: ScheduleRecord =
            serde_json::from_str(&json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Self(record))
    }
}

struct TriggerRow(TriggerState);

impl<'r> FromRow<'r, SqliteRow> for TriggerRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let schedule_id: String = row.try_get("schedule_id")?;
        let trigger_id: String = row.try_get("trigger_id")?;
        let progress: f64 = row.try_get("progress")?;

        let schedule_id = ScheduleId::from_str(&schedule_id)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let trigger_id =
            TriggerId::from_str(&trigger_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(TriggerState {
            schedule_id,
            trigger_id,
            progress,
        }))
    }
}

/// `SQLite`-backed schedule store.
pub struct SqliteScheduleStore {
    pool: SqlitePool,
    ceiling: usize,
}

impl SqliteScheduleStore {
    /// Create a store backed by the given connection pool, with the
    /// default schedule ceiling.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_ceiling(pool, DEFAULT_SCHEDULE_CEILING)
    }

    /// Create a store with an explicit schedule ceiling.
    #[must_use]
    pub fn with_ceiling(pool: SqlitePool, ceiling: usize) -> Self {
        Self { pool, ceiling }
    }

    async fn count_in_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<usize, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedules")
            .fetch_one(&mut **tx)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn insert_record(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ScheduleRecord,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO schedules (id, grp, state, payload_type, priority, end_at, record_json) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.schedule.id.to_string())
        .bind(&record.schedule.group)
        .bind(record.state.as_str())
        .bind(record.schedule.payload.payload_type().to_string())
        .bind(record.schedule.priority)
        .bind(record.schedule.end.map(fmt_ts))
        .bind(&json)
        .execute(&mut **tx)
        .await?;

        for trigger in &record.schedule.triggers {
            sqlx::query(
                "INSERT INTO schedule_triggers (schedule_id, trigger_id, kind, goal, progress) VALUES (?, ?, ?, ?, 0)",
            )
            .bind(record.schedule.id.to_string())
            .bind(trigger.id.to_string())
            .bind(trigger.kind.to_string())
            .bind(trigger.goal)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn write_record(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ScheduleRecord,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            "UPDATE schedules SET grp = ?, state = ?, payload_type = ?, priority = ?, end_at = ?, record_json = ? WHERE id = ?",
        )
        .bind(&record.schedule.group)
        .bind(record.state.as_str())
        .bind(record.schedule.payload.payload_type().to_string())
        .bind(record.schedule.priority)
        .bind(record.schedule.end.map(fmt_ts))
        .bind(&json)
        .bind(record.schedule.id.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn load_record(
        tx: &mut Transaction<'_, Sqlite>,
        id: ScheduleId,
    ) -> Result<Option<ScheduleRecord>, StorageError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(Wrapper::maybe(row))
    }

    async fn delete_rows(
        tx: &mut Transaction<'_, Sqlite>,
        id: ScheduleId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM schedule_triggers WHERE schedule_id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

impl ScheduleStore for SqliteScheduleStore {
    async fn save(&self, record: ScheduleRecord) -> Result<bool, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let count = Self::count_in_tx(&mut tx).await?;
        if count + 1 > self.ceiling {
            return Ok(false);
        }
        Self::insert_record(&mut tx, &record).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(true)
    }

    async fn save_all(&self, records: Vec<ScheduleRecord>) -> Result<bool, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let count = Self::count_in_tx(&mut tx).await?;
        if count + records.len() > self.ceiling {
            return Ok(false);
        }
        for record in &records {
            Self::insert_record(&mut tx, record).await?;
        }
        tx.commit().await.map_err(StorageError::from)?;
        Ok(true)
    }

    async fn get(&self, id: ScheduleId) -> Result<Option<ScheduleRecord>, AutomationError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn get_by_group(&self, group: String) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE grp = ?")
            .bind(&group)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn get_by_type(
        &self,
        payload_type: PayloadType,
    ) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE payload_type = ?")
            .bind(payload_type.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn get_by_states(
        &self,
        states: Vec<ExecutionState>,
    ) -> Result<Vec<ScheduleRecord>, AutomationError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; states.len()].join(", ");
        let sql = format!("SELECT * FROM schedules WHERE state IN ({placeholders})");
        let mut query = sqlx::query_as(&sql);
        for state in &states {
            query = query.bind(state.as_str());
        }
        let rows: Vec<Wrapper> = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn get_active_expired(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM schedules WHERE state != 'finished' AND end_at IS NOT NULL AND end_at <= ?",
        )
        .bind(fmt_ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn get_trigger_states(
        &self,
        schedule_id: Option<ScheduleId>,
        kind: Option<TriggerKind>,
    ) -> Result<Vec<TriggerState>, AutomationError> {
        let mut sql = String::from(
            "SELECT st.schedule_id, st.trigger_id, st.progress FROM schedule_triggers st \
             JOIN schedules s ON s.id = st.schedule_id WHERE s.state != 'finished'",
        );
        if schedule_id.is_some() {
            sql.push_str(" AND st.schedule_id = ?");
        }
        if kind.is_some() {
            sql.push_str(" AND st.kind = ?");
        }

        let mut query = sqlx::query_as(&sql);
        if let Some(id) = schedule_id {
            query = query.bind(id.to_string());
        }
        if let Some(kind) = kind {
            query = query.bind(kind.to_string());
        }

        let rows: Vec<TriggerRow> = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn update<F>(
        &self,
        id: ScheduleId,
        f: F,
    ) -> Result<Option<ScheduleRecord>, AutomationError>
    where
        F: FnOnce(&mut ScheduleRecord) + Send,
    {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let Some(mut record) = Self::load_record(&mut tx, id).await? else {
            return Ok(None);
        };
        f(&mut record);
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Some(record))
    }

    async fn commit_event_batch(
        &self,
        progress: Vec<TriggerState>,
        firings: Vec<(ScheduleId, TriggerContext)>,
        now: Timestamp,
    ) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for state in &progress {
            sqlx::query(
                "UPDATE schedule_triggers SET progress = ? WHERE schedule_id = ? AND trigger_id = ?",
            )
            .bind(state.progress)
            .bind(state.schedule_id.to_string())
            .bind(state.trigger_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        let mut updated = Vec::new();
        for (id, context) in firings {
            let Some(mut record) = Self::load_record(&mut tx, id).await? else {
                continue;
            };
            record.fired(context, now);
            Self::write_record(&mut tx, &record).await?;
            updated.push(record);
        }

        tx.commit().await.map_err(StorageError::from)?;
        Ok(updated)
    }

    async fn delete(&self, id: ScheduleId) -> Result<Option<ScheduleRecord>, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let Some(record) = Self::load_record(&mut tx, id).await? else {
            return Ok(None);
        };
        Self::delete_rows(&mut tx, id).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Some(record))
    }

    async fn delete_by_group(
        &self,
        group: String,
    ) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE grp = ?")
            .bind(&group)
            .fetch_all(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        let records = Wrapper::unwrap_all(rows);
        for record in &records {
            Self::delete_rows(&mut tx, record.schedule.id).await?;
        }
        tx.commit().await.map_err(StorageError::from)?;
        Ok(records)
    }

    async fn delete_all(&self) -> Result<Vec<ScheduleRecord>, AutomationError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules")
            .fetch_all(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        sqlx::query("DELETE FROM schedule_triggers")
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        sqlx::query("DELETE FROM schedules")
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn count(&self) -> Result<usize, AutomationError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedules")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use cadence_domain::schedule::{Payload, Schedule};
    use cadence_domain::trigger::Trigger;
    use chrono::TimeDelta;
    use serde_json::json;

    async fn setup() -> SqliteScheduleStore {
        setup_with_ceiling(DEFAULT_SCHEDULE_CEILING).await
    }

    async fn setup_with_ceiling(ceiling: usize) -> SqliteScheduleStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
            schedule_ceiling: ceiling,
        }
        .build()
        .await
        .unwrap();
        SqliteScheduleStore::with_ceiling(db.pool().clone(), ceiling)
    }

    fn record() -> ScheduleRecord {
        let schedule = Schedule::builder(Payload::Message(json!({"title": "hi"})))
            .trigger(Trigger::new(TriggerKind::Foreground, 2.0))
            .build()
            .unwrap();
        ScheduleRecord::new(schedule, cadence_domain::time::now())
    }

    fn context() -> TriggerContext {
        TriggerContext {
            kind: TriggerKind::Foreground,
            goal: 2.0,
            event: json!({}),
            fired_at: cadence_domain::time::now(),
        }
    }

    #[tokio::test]
    async fn should_save_and_retrieve_record() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;

        assert!(store.save(record.clone()).await.unwrap());
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_return_none_when_record_not_found() {
        let store = setup().await;
        assert!(store.get(ScheduleId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_create_trigger_rows_with_zero_progress() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        store.save(record).await.unwrap();

        let states = store.get_trigger_states(Some(id), None).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].progress, 0.0);
    }

    #[tokio::test]
    async fn should_reject_save_when_ceiling_reached() {
        let store = setup_with_ceiling(1).await;
        assert!(store.save(record()).await.unwrap());
        assert!(!store.save(record()).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_reject_whole_batch_when_final_count_exceeds_ceiling() {
        let store = setup_with_ceiling(2).await;
        let batch = vec![record(), record(), record()];
        assert!(!store.save_all(batch).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_save_batch_that_exactly_fills_ceiling() {
        let store = setup_with_ceiling(2).await;
        assert!(store.save_all(vec![record(), record()]).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn should_filter_by_group() {
        let store = setup().await;
        let mut grouped = record();
        grouped.schedule.group = Some("onboarding".to_string());
        store.save(grouped).await.unwrap();
        store.save(record()).await.unwrap();

        let found = store.get_by_group("onboarding".to_string()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schedule.group.as_deref(), Some("onboarding"));
    }

    #[tokio::test]
    async fn should_filter_by_payload_type() {
        let store = setup().await;
        store.save(record()).await.unwrap();
        let actions = Schedule::builder(Payload::Actions(json!({"beep": true})))
            .trigger(Trigger::new(TriggerKind::Foreground, 1.0))
            .build()
            .unwrap();
        store
            .save(ScheduleRecord::new(actions, cadence_domain::time::now()))
            .await
            .unwrap();

        let messages = store.get_by_type(PayloadType::Message).await.unwrap();
        let actions = store.get_by_type(PayloadType::Actions).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(actions.len(), 1);
    }

    #[tokio::test]
    async fn should_filter_by_states() {
        let store = setup().await;
        let idle = record();
        let mut finished = record();
        finished.expire(cadence_domain::time::now());
        store.save(idle).await.unwrap();
        store.save(finished).await.unwrap();

        let idle_records = store
            .get_by_states(vec![ExecutionState::Idle])
            .await
            .unwrap();
        assert_eq!(idle_records.len(), 1);

        let all = store
            .get_by_states(vec![ExecutionState::Idle, ExecutionState::Finished])
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        assert!(store.get_by_states(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_find_active_expired_records() {
        let store = setup().await;
        let now = cadence_domain::time::now();

        let mut expired = record();
        expired.schedule.end = Some(now - TimeDelta::seconds(10));
        let expired_id = expired.schedule.id;
        store.save(expired).await.unwrap();

        let mut live = record();
        live.schedule.end = Some(now + TimeDelta::seconds(3600));
        store.save(live).await.unwrap();

        let found = store.get_active_expired(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schedule.id, expired_id);
    }

    #[tokio::test]
    async fn should_update_record_through_closure() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        store.save(record).await.unwrap();

        let now = cadence_domain::time::now();
        let updated = store
            .update(id, move |r| r.fired(context(), now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.state, ExecutionState::Preparing);

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.state, ExecutionState::Preparing);
    }

    #[tokio::test]
    async fn should_return_none_when_updating_missing_record() {
        let store = setup().await;
        let updated = store
            .update(ScheduleId::new(), |r| r.expire(cadence_domain::time::now()))
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn should_commit_progress_and_firings_atomically() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        let trigger_id = record.schedule.triggers[0].id;
        store.save(record).await.unwrap();

        let now = cadence_domain::time::now();
        let updated = store
            .commit_event_batch(
                vec![TriggerState {
                    schedule_id: id,
                    trigger_id,
                    progress: 0.0,
                }],
                vec![(id, context())],
                now,
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].state, ExecutionState::Preparing);

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.state, ExecutionState::Preparing);
    }

    #[tokio::test]
    async fn should_drop_firings_for_missing_schedules() {
        let store = setup().await;
        let updated = store
            .commit_event_batch(
                Vec::new(),
                vec![(ScheduleId::new(), context())],
                cadence_domain::time::now(),
            )
            .await
            .unwrap();
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn should_persist_trigger_progress_updates() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        let trigger_id = record.schedule.triggers[0].id;
        store.save(record).await.unwrap();

        store
            .commit_event_batch(
                vec![TriggerState {
                    schedule_id: id,
                    trigger_id,
                    progress: 1.0,
                }],
                Vec::new(),
                cadence_domain::time::now(),
            )
            .await
            .unwrap();

        let states = store.get_trigger_states(Some(id), None).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].progress, 1.0);
    }

    #[tokio::test]
    async fn should_exclude_finished_schedules_from_trigger_states() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        store.save(record).await.unwrap();

        store
            .update(id, |r| r.expire(cadence_domain::time::now()))
            .await
            .unwrap();

        let states = store.get_trigger_states(None, None).await.unwrap();
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn should_filter_trigger_states_by_kind() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        store.save(record).await.unwrap();

        let foreground = store
            .get_trigger_states(Some(id), Some(TriggerKind::Foreground))
            .await
            .unwrap();
        assert_eq!(foreground.len(), 1);

        let background = store
            .get_trigger_states(Some(id), Some(TriggerKind::Background))
            .await
            .unwrap();
        assert!(background.is_empty());
    }

    #[tokio::test]
    async fn should_delete_record_and_trigger_rows() {
        let store = setup().await;
        let record = record();
        let id = record.schedule.id;
        store.save(record).await.unwrap();

        let deleted = store.delete(id).await.unwrap();
        assert!(deleted.is_some());
        assert!(store.get(id).await.unwrap().is_none());
        // Finished filter aside, the rows themselves are gone.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedule_triggers")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        assert!(store.delete(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_delete_by_group() {
        let store = setup().await;
        let mut grouped = record();
        grouped.schedule.group = Some("g".to_string());
        store.save(grouped).await.unwrap();
        store.save(record()).await.unwrap();

        let deleted = store.delete_by_group("g".to_string()).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_delete_all() {
        let store = setup().await;
        store.save(record()).await.unwrap();
        store.save(record()).await.unwrap();

        let deleted = store.delete_all().await.unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_preserve_full_record_through_roundtrip() {
        let store = setup().await;
        let mut record = record();
        record.fired(context(), cadence_domain::time::now());
        record.schedule.group = Some("roundtrip".to_string());
        let id = record.schedule.id;

        store.save(record.clone()).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.state, ExecutionState::Preparing);
        assert_eq!(fetched.trigger_context, record.trigger_context);
        assert_eq!(fetched.schedule, record.schedule);
    }
}
