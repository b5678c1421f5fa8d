//! Trigger evaluator — environment events → per-trigger progress → firings.
//!
//! Keeps an in-memory mirror of trigger progress for every non-terminal
//! schedule, restored from the store at startup. The evaluator itself is
//! pure bookkeeping: it mutates its mirror and reports which progress
//! rows changed and which triggers fired, and the engine persists both
//! in a single store transaction before acting on the firings.

use std::collections::HashMap;

use cadence_domain::context::TriggerContext;
use cadence_domain::event::EnvironmentEvent;
use cadence_domain::id::{ScheduleId, TriggerId};
use cadence_domain::record::ScheduleRecord;
use cadence_domain::time::Timestamp;
use cadence_domain::trigger::{Trigger, TriggerState};

/// A trigger that reached its goal, with the captured context.
#[derive(Debug, Clone)]
pub struct TriggerFiring {
    pub schedule_id: ScheduleId,
    pub context: TriggerContext,
}

/// Everything one event produced: dirty progress rows (including the
/// resets of consumed triggers) and the firings to apply.
#[derive(Debug, Default)]
pub struct EventOutcome {
    pub progress: Vec<TriggerState>,
    pub firings: Vec<TriggerFiring>,
}

impl EventOutcome {
    /// Whether the event changed anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty() && self.firings.is_empty()
    }
}

struct Tracked {
    triggers: Vec<Trigger>,
    progress: HashMap<TriggerId, f64>,
    armed: bool,
}

/// Converts raw environment events into trigger firings.
#[derive(Default)]
pub struct TriggerEvaluator {
    tracked: HashMap<ScheduleId, Tracked>,
}

impl TriggerEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or refresh) tracking for a schedule record.
    ///
    /// Progress already accumulated is kept for triggers that still
    /// exist; progress for removed triggers is dropped. Terminal records
    /// stay tracked but disarmed so firings stop without losing state.
    pub fn track(&mut self, record: &ScheduleRecord) {
        let armed = !record.is_terminal();
        let triggers = record.schedule.triggers.clone();
        let entry = self
            .tracked
            .entry(record.schedule.id)
            .or_insert_with(|| Tracked {
                triggers: Vec::new(),
                progress: HashMap::new(),
                armed,
            });
        entry
            .progress
            .retain(|trigger_id, _| triggers.iter().any(|t| t.id == *trigger_id));
        entry.triggers = triggers;
        entry.armed = armed;
    }

    /// Rebuild the mirror from restored records and persisted progress.
    pub fn restore(&mut self, records: &[ScheduleRecord], states: &[TriggerState]) {
        self.tracked.clear();
        for record in records {
            self.track(record);
        }
        for state in states {
            if let Some(tracked) = self.tracked.get_mut(&state.schedule_id)
                && tracked.triggers.iter().any(|t| t.id == state.trigger_id)
            {
                tracked.progress.insert(state.trigger_id, state.progress);
            }
        }
    }

    /// Stop tracking a schedule entirely.
    pub fn remove(&mut self, id: ScheduleId) {
        self.tracked.remove(&id);
    }

    /// Reset all progress for a schedule, returning the zeroed rows for
    /// persistence. Applied when a schedule is penalized or invalidated.
    pub fn reset_progress(&mut self, id: ScheduleId) -> Vec<TriggerState> {
        let Some(tracked) = self.tracked.get_mut(&id) else {
            return Vec::new();
        };
        let mut zeroed = Vec::new();
        for trigger in &tracked.triggers {
            if tracked.progress.insert(trigger.id, 0.0).is_some_and(|p| p != 0.0) {
                zeroed.push(TriggerState {
                    schedule_id: id,
                    trigger_id: trigger.id,
                    progress: 0.0,
                });
            }
        }
        zeroed
    }

    /// Run one environment event against every armed trigger.
    ///
    /// Each trigger reaching its goal emits an independent firing and has
    /// its progress reset to zero, so the same underlying event cannot
    /// re-fire a consumed trigger until the goal is reached again.
    pub fn process_event(&mut self, event: &EnvironmentEvent, now: Timestamp) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        for (schedule_id, tracked) in &mut self.tracked {
            if !tracked.armed {
                continue;
            }
            for trigger in &tracked.triggers {
                let Some(weight) = trigger.match_weight(event) else {
                    continue;
                };
                let progress = tracked.progress.entry(trigger.id).or_insert(0.0);
                *progress += weight;

                if *progress >= trigger.goal {
                    *progress = 0.0;
                    outcome.firings.push(TriggerFiring {
                        schedule_id: *schedule_id,
                        context: TriggerContext {
                            kind: trigger.kind,
                            goal: trigger.goal,
                            event: event.payload(),
                            fired_at: now,
                        },
                    });
                }
                outcome.progress.push(TriggerState {
                    schedule_id: *schedule_id,
                    trigger_id: trigger.id,
                    progress: *progress,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::schedule::{Payload, Schedule};
    use cadence_domain::trigger::{EventPredicate, TriggerKind};
    use serde_json::json;

    fn record_with(triggers: Vec<Trigger>) -> ScheduleRecord {
        let mut builder = Schedule::builder(Payload::Actions(json!({})));
        for trigger in triggers {
            builder = builder.trigger(trigger);
        }
        ScheduleRecord::new(builder.build().unwrap(), cadence_domain::time::now())
    }

    fn now() -> Timestamp {
        cadence_domain::time::now()
    }

    #[test]
    fn should_fire_when_progress_reaches_goal() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 2.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let first = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert!(first.firings.is_empty());
        assert_eq!(first.progress.len(), 1);
        assert_eq!(first.progress[0].progress, 1.0);

        let second = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert_eq!(second.firings.len(), 1);
        assert_eq!(second.firings[0].schedule_id, record.schedule.id);
        // Progress reset on firing
        assert_eq!(second.progress[0].progress, 0.0);
    }

    #[test]
    fn should_not_refire_until_goal_reached_again() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 2.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        evaluator.process_event(&EnvironmentEvent::Foreground, now());
        let fired = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert_eq!(fired.firings.len(), 1);

        // Consumed: one more event is only halfway to the goal again.
        let after = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert!(after.firings.is_empty());
        assert_eq!(after.progress[0].progress, 1.0);
    }

    #[test]
    fn should_accumulate_event_value_for_value_triggers() {
        let record = record_with(vec![Trigger::new(TriggerKind::CustomEventValue, 10.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let purchase = |value: f64| EnvironmentEvent::CustomEvent {
            name: "purchase".to_string(),
            value: Some(value),
            properties: json!({}),
        };

        let first = evaluator.process_event(&purchase(6.0), now());
        assert!(first.firings.is_empty());

        let second = evaluator.process_event(&purchase(4.5), now());
        assert_eq!(second.firings.len(), 1);
        assert_eq!(second.firings[0].context.goal, 10.0);
    }

    #[test]
    fn should_skip_triggers_whose_predicate_does_not_match() {
        let trigger = Trigger::new(TriggerKind::ScreenView, 1.0).with_predicate(
            EventPredicate::Equals {
                key: "name".to_string(),
                value: json!("checkout"),
            },
        );
        let record = record_with(vec![trigger]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let outcome = evaluator.process_event(
            &EnvironmentEvent::ScreenViewed {
                name: "home".to_string(),
            },
            now(),
        );
        // No progress consumed at all
        assert!(outcome.is_empty());

        let outcome = evaluator.process_event(
            &EnvironmentEvent::ScreenViewed {
                name: "checkout".to_string(),
            },
            now(),
        );
        assert_eq!(outcome.firings.len(), 1);
    }

    #[test]
    fn should_emit_independent_firings_for_multiple_triggers() {
        let record = record_with(vec![
            Trigger::new(TriggerKind::Foreground, 1.0),
            Trigger::new(TriggerKind::Foreground, 1.0),
        ]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let outcome = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert_eq!(outcome.firings.len(), 2);
    }

    #[test]
    fn should_not_accumulate_for_disarmed_schedules() {
        let mut record = record_with(vec![Trigger::new(TriggerKind::Foreground, 1.0)]);
        record.expire(now());
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let outcome = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert!(outcome.is_empty());
    }

    #[test]
    fn should_restore_persisted_progress() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 2.0)]);
        let trigger_id = record.schedule.triggers[0].id;
        let mut evaluator = TriggerEvaluator::new();
        evaluator.restore(
            &[record.clone()],
            &[TriggerState {
                schedule_id: record.schedule.id,
                trigger_id,
                progress: 1.0,
            }],
        );

        // One more event completes the restored progress.
        let outcome = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert_eq!(outcome.firings.len(), 1);
    }

    #[test]
    fn should_drop_progress_for_removed_triggers_on_restore() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 2.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.restore(
            &[record.clone()],
            &[TriggerState {
                schedule_id: record.schedule.id,
                trigger_id: TriggerId::new(),
                progress: 99.0,
            }],
        );

        let outcome = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert!(outcome.firings.is_empty());
    }

    #[test]
    fn should_zero_progress_on_reset() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 3.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);
        evaluator.process_event(&EnvironmentEvent::Foreground, now());

        let zeroed = evaluator.reset_progress(record.schedule.id);
        assert_eq!(zeroed.len(), 1);
        assert_eq!(zeroed[0].progress, 0.0);

        // Untouched progress stays zeroed; nothing to report twice.
        let again = evaluator.reset_progress(record.schedule.id);
        assert!(again.is_empty());
    }

    #[test]
    fn should_stop_tracking_removed_schedules() {
        let record = record_with(vec![Trigger::new(TriggerKind::Foreground, 1.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);
        evaluator.remove(record.schedule.id);

        let outcome = evaluator.process_event(&EnvironmentEvent::Foreground, now());
        assert!(outcome.is_empty());
    }

    #[test]
    fn should_capture_event_payload_in_firing_context() {
        let record = record_with(vec![Trigger::new(TriggerKind::RegionEnter, 1.0)]);
        let mut evaluator = TriggerEvaluator::new();
        evaluator.track(&record);

        let outcome = evaluator.process_event(
            &EnvironmentEvent::RegionEntered {
                region_id: "store-42".to_string(),
            },
            now(),
        );
        assert_eq!(outcome.firings.len(), 1);
        assert_eq!(outcome.firings[0].context.event["region_id"], "store-42");
        assert_eq!(outcome.firings[0].context.kind, TriggerKind::RegionEnter);
    }
}
