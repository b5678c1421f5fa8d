//! Payload — the opaque, type-tagged data a schedule executes.
//!
//! The engine never interprets payload contents; it only carries them to
//! the execution delegate. The tag distinguishes message payloads from
//! action maps so callers can cancel or query by type.

use serde::{Deserialize, Serialize};

/// Type-tagged schedule payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// An in-app message definition, rendered by the execution delegate.
    Message(serde_json::Value),
    /// A map of actions to run.
    Actions(serde_json::Value),
}

impl Payload {
    /// The payload's type tag.
    #[must_use]
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::Message(_) => PayloadType::Message,
            Self::Actions(_) => PayloadType::Actions,
        }
    }
}

/// Discriminant for [`Payload`], used for type-scoped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    Message,
    Actions,
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::Actions => f.write_str("actions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_report_payload_type() {
        let message = Payload::Message(json!({"title": "hello"}));
        let actions = Payload::Actions(json!({"deep_link": "app://home"}));
        assert_eq!(message.payload_type(), PayloadType::Message);
        assert_eq!(actions.payload_type(), PayloadType::Actions);
    }

    #[test]
    fn should_roundtrip_payload_through_serde_json() {
        let payload = Payload::Actions(json!({"add_tag": "vip"}));
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn should_display_payload_type_tags() {
        assert_eq!(PayloadType::Message.to_string(), "message");
        assert_eq!(PayloadType::Actions.to_string(), "actions");
    }
}
