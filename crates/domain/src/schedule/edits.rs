//! Schedule edits — a partial update applied to an existing schedule.
//!
//! Edits can never change a schedule's `id`, `group`, `triggers`, or
//! creation time. Changing the payload clears the schedule's metadata
//! unless the edit supplies new metadata, which forces the next prepare
//! pass to re-run full validation against fresh data.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Audience, Payload, Schedule};
use crate::time::Timestamp;

/// Partial update set for [`Schedule`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEdits {
    pub priority: Option<i32>,
    pub limit: Option<u32>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub delay: Option<Duration>,
    pub interval: Option<Duration>,
    pub edit_grace_period: Option<Duration>,
    pub audience: Option<Audience>,
    pub payload: Option<Payload>,
    pub metadata: Option<serde_json::Value>,
    pub frequency_constraint_ids: Option<Vec<String>>,
}

impl ScheduleEdits {
    /// Apply these edits to a schedule in place.
    pub fn apply(&self, schedule: &mut Schedule) {
        if let Some(priority) = self.priority {
            schedule.priority = priority;
        }
        if let Some(limit) = self.limit {
            schedule.limit = limit;
        }
        if let Some(start) = self.start {
            schedule.start = Some(start);
        }
        if let Some(end) = self.end {
            schedule.end = Some(end);
        }
        if let Some(delay) = self.delay {
            schedule.delay = Some(delay);
        }
        if let Some(interval) = self.interval {
            schedule.interval = Some(interval);
        }
        if let Some(grace) = self.edit_grace_period {
            schedule.edit_grace_period = Some(grace);
        }
        if let Some(audience) = &self.audience {
            schedule.audience = Some(audience.clone());
        }
        if let Some(payload) = &self.payload {
            if *payload != schedule.payload {
                schedule.payload = payload.clone();
                schedule.metadata = serde_json::Value::Null;
            }
        }
        if let Some(metadata) = &self.metadata {
            schedule.metadata = metadata.clone();
        }
        if let Some(ids) = &self.frequency_constraint_ids {
            schedule.frequency_constraint_ids = ids.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{Trigger, TriggerKind};
    use serde_json::json;

    fn schedule() -> Schedule {
        Schedule::builder(Payload::Message(json!({"title": "v1"})))
            .trigger(Trigger::new(TriggerKind::Foreground, 1.0))
            .metadata(json!({"revision": 1}))
            .build()
            .unwrap()
    }

    #[test]
    fn should_leave_schedule_untouched_when_edits_are_empty() {
        let mut edited = schedule();
        let original = edited.clone();
        ScheduleEdits::default().apply(&mut edited);
        assert_eq!(edited, original);
    }

    #[test]
    fn should_apply_partial_fields() {
        let mut edited = schedule();
        let edits = ScheduleEdits {
            priority: Some(5),
            limit: Some(10),
            interval: Some(Duration::from_secs(60)),
            ..ScheduleEdits::default()
        };
        edits.apply(&mut edited);
        assert_eq!(edited.priority, 5);
        assert_eq!(edited.limit, 10);
        assert_eq!(edited.interval, Some(Duration::from_secs(60)));
        // Unrelated fields untouched
        assert_eq!(edited.metadata, json!({"revision": 1}));
    }

    #[test]
    fn should_reset_metadata_when_payload_changes() {
        let mut edited = schedule();
        let edits = ScheduleEdits {
            payload: Some(Payload::Message(json!({"title": "v2"}))),
            ..ScheduleEdits::default()
        };
        edits.apply(&mut edited);
        assert_eq!(edited.payload, Payload::Message(json!({"title": "v2"})));
        assert_eq!(edited.metadata, serde_json::Value::Null);
    }

    #[test]
    fn should_keep_metadata_when_payload_is_unchanged() {
        let mut edited = schedule();
        let edits = ScheduleEdits {
            payload: Some(Payload::Message(json!({"title": "v1"}))),
            ..ScheduleEdits::default()
        };
        edits.apply(&mut edited);
        assert_eq!(edited.metadata, json!({"revision": 1}));
    }

    #[test]
    fn should_prefer_explicit_metadata_over_payload_reset() {
        let mut edited = schedule();
        let edits = ScheduleEdits {
            payload: Some(Payload::Message(json!({"title": "v2"}))),
            metadata: Some(json!({"revision": 2})),
            ..ScheduleEdits::default()
        };
        edits.apply(&mut edited);
        assert_eq!(edited.metadata, json!({"revision": 2}));
    }

    #[test]
    fn should_replace_frequency_constraint_ids() {
        let mut edited = schedule();
        let edits = ScheduleEdits {
            frequency_constraint_ids: Some(vec!["cap-1".to_string()]),
            ..ScheduleEdits::default()
        };
        edits.apply(&mut edited);
        assert_eq!(edited.frequency_constraint_ids, vec!["cap-1"]);
    }
}
