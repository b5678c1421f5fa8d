//! Trigger context — snapshot of the firing that started a cycle.
//!
//! Attached to a schedule record for the duration of one
//! prepare/execute cycle and persisted with it, so a process kill
//! between "trigger fired" and "execute completed" leaves enough
//! information to replay the cycle with the same context.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::trigger::TriggerKind;

/// Which trigger fired, with what goal, and with what event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub kind: TriggerKind,
    pub goal: f64,
    /// Snapshot of the firing event's payload.
    pub event: serde_json::Value,
    pub fired_at: Timestamp,
}
