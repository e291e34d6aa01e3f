//! Event envelope shared by every topic
//!
//! The envelope is the on-bus JSON shape:
//! `{id, from, to, content: {payload, headers}, metadata: {event: {...}}}`.
//! Unknown fields are captured in flattened maps so the router forwards
//! envelopes it does not fully understand without dropping anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Event type carried in `metadata.event.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Transfer lifecycle event
    Transfer,
    /// Fulfil-phase event
    Fulfil,
    /// Notification delivery event
    Notification,
    /// Position accounting event
    Position,
}

/// Event action carried in `metadata.event.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventAction {
    /// Prepare a transfer
    Prepare,
    /// Commit a reserved transfer
    Commit,
    /// Reject a reserved transfer
    Reject,
    /// Abort a transfer
    Abort,
    /// Timeout of a reserved transfer (emitted by the timeout subsystem)
    TimeoutReserved,
    /// Generic transfer event (position fan-in)
    Transfer,
    /// Replay of an already-finalized prepare
    PrepareDuplicate,
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventAction::Prepare => "prepare",
            EventAction::Commit => "commit",
            EventAction::Reject => "reject",
            EventAction::Abort => "abort",
            EventAction::TimeoutReserved => "timeout-reserved",
            EventAction::Transfer => "transfer",
            EventAction::PrepareDuplicate => "prepare-duplicate",
        };
        write!(f, "{}", s)
    }
}

/// Terminal status of the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Processing succeeded
    Success,
    /// Processing failed
    Failure,
}

/// Event state: status plus optional error code/description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    /// Success or failure
    pub status: EventStatus,

    /// Error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,

    /// Human-readable description on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventState {
    /// Successful state
    pub fn success() -> Self {
        Self {
            status: EventStatus::Success,
            code: None,
            description: None,
        }
    }

    /// Failed state with a wire error code
    pub fn failure(code: u32, description: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Failure,
            code: Some(code),
            description: Some(description.into()),
        }
    }
}

/// `metadata.event` block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Unique event id
    pub id: Uuid,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Event action
    pub action: EventAction,

    /// Event state
    pub state: EventState,

    /// Creation instant, RFC 3339 UTC
    pub created_at: DateTime<Utc>,
}

impl EventMetadata {
    /// New metadata block with a fresh event id
    pub fn new(event_type: EventType, action: EventAction, state: EventState) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            action,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Envelope `metadata` block; unknown siblings of `event` are preserved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// The event block
    pub event: EventMetadata,

    /// Fields this core does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Envelope `content` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    /// Domain payload
    pub payload: Value,

    /// Transport headers forwarded verbatim
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,

    /// Fields this core does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The on-bus message shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Business identifier (the transfer id for lifecycle events)
    pub id: String,

    /// Originating participant or subsystem
    pub from: String,

    /// Destination participant or subsystem
    pub to: String,

    /// Payload and headers
    pub content: MessageContent,

    /// Routing metadata
    pub metadata: Metadata,

    /// Fields this core does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventEnvelope {
    /// Build a new envelope
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        event_type: EventType,
        action: EventAction,
        state: EventState,
        payload: Value,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            content: MessageContent {
                payload,
                headers: Map::new(),
                extra: Map::new(),
            },
            metadata: Metadata {
                event: EventMetadata::new(event_type, action, state),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Replace the event state, keeping everything else
    pub fn with_state(mut self, state: EventState) -> Self {
        self.metadata.event.state = state;
        self
    }

    /// Serialize to UTF-8 JSON bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from UTF-8 JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> EventEnvelope {
        EventEnvelope::new(
            "t1",
            "dfspA",
            "dfspB",
            EventType::Transfer,
            EventAction::Prepare,
            EventState::success(),
            json!({"transferId": "t1"}),
        )
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = sample();
        let bytes = envelope.to_bytes().unwrap();
        let decoded = EventEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.id, "t1");
        assert_eq!(decoded.from, "dfspA");
        assert_eq!(decoded.metadata.event.action, EventAction::Prepare);
        assert_eq!(decoded.metadata.event.state.status, EventStatus::Success);
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = json!({
            "id": "t9",
            "from": "dfspA",
            "to": "dfspB",
            "operatorTag": "keep-me",
            "content": {"payload": {}, "traceparent": "00-abc"},
            "metadata": {
                "event": {
                    "id": "7f6d4b0e-44d0-4f3b-bd5c-7a1c9c2a2f10",
                    "type": "transfer",
                    "action": "prepare",
                    "state": {"status": "success"},
                    "createdAt": "2025-01-01T00:00:00Z"
                },
                "trace": {"spanId": "b7ad6b7169203331"}
            }
        });

        let envelope: EventEnvelope = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&envelope).unwrap();

        assert_eq!(back["operatorTag"], "keep-me");
        assert_eq!(back["content"]["traceparent"], "00-abc");
        assert_eq!(back["metadata"]["trace"]["spanId"], "b7ad6b7169203331");
    }

    #[test]
    fn test_kebab_case_actions() {
        let state = EventState::success();
        let meta = EventMetadata::new(EventType::Notification, EventAction::TimeoutReserved, state);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["action"], "timeout-reserved");

        let meta = EventMetadata::new(
            EventType::Notification,
            EventAction::PrepareDuplicate,
            EventState::success(),
        );
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["action"], "prepare-duplicate");
    }

    #[test]
    fn test_failure_state_carries_code() {
        let state = EventState::failure(3106, "Modified request");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["code"], 3106);
        assert_eq!(value["description"], "Modified request");
    }
}
