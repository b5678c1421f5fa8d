//! Audience — an external membership predicate gating execution.

use serde::{Deserialize, Serialize};

/// Predicate over user/device identity, evaluated by an external
/// collaborator during the prepare step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audience {
    /// Opaque selector handed to the audience evaluator.
    pub predicate: serde_json::Value,
    /// What to do with the schedule when the user is not a member.
    #[serde(default)]
    pub miss_behavior: MissBehavior,
}

/// Resolution applied when the audience check excludes the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissBehavior {
    /// Delete the schedule.
    Cancel,
    /// Return to idle without any bookkeeping change.
    #[default]
    Skip,
    /// Count the miss against the limit and apply the interval pause,
    /// as if the schedule had executed.
    Penalize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_default_miss_behavior_to_skip() {
        let audience: Audience =
            serde_json::from_value(json!({"predicate": {"tag": "beta"}})).unwrap();
        assert_eq!(audience.miss_behavior, MissBehavior::Skip);
    }

    #[test]
    fn should_roundtrip_audience_through_serde_json() {
        let audience = Audience {
            predicate: json!({"tag": "vip"}),
            miss_behavior: MissBehavior::Penalize,
        };
        let json = serde_json::to_string(&audience).unwrap();
        let parsed: Audience = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, audience);
    }
}
