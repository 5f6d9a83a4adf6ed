//! Wire message envelopes.
//!
//! Defines the outbound command envelope and the three inbound message
//! shapes of the BiDi protocol, discriminated by their `type` field.
//!
//! # Wire Format
//!
//! Outbound:
//! ```json
//! { "id": 1, "method": "session.status", "params": {} }
//! ```
//!
//! Inbound:
//!
//! | `type` | required fields | meaning |
//! |--------|-----------------|---------|
//! | `success` | `id`, `result` | command completed |
//! | `error` | `id`, `error`, `message`, optional `stacktrace` | command failed |
//! | `event` | `method`, `params` | spontaneous notification |
//!
//! Unknown inbound fields are preserved in an additional-data map for
//! forward compatibility but are never interpreted.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identifiers::CommandId;

// ============================================================================
// CommandEnvelope
// ============================================================================

/// An outbound command: `{ id, method, params }`.
///
/// `id` is unique within a session, monotonically increasing, never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Correlation id assigned by the dispatcher.
    pub id: CommandId,

    /// Command name in `module.methodName` format.
    pub method: String,

    /// Command parameters.
    pub params: Value,
}

// ============================================================================
// SuccessResponse
// ============================================================================

/// An inbound `type = "success"` message.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    /// Matches a previously issued command id.
    pub id: CommandId,

    /// Raw result object.
    pub result: Value,

    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// An inbound `type = "error"` message.
///
/// Remote ends send `"id": null` when the offending command could not be
/// parsed; such responses can never match a pending command.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Matches a previously issued command id, when the remote end knows it.
    #[serde(default)]
    pub id: Option<CommandId>,

    /// Protocol error code.
    pub error: String,

    /// Human-readable description.
    pub message: String,

    /// Remote-end stack trace, when provided.
    #[serde(default)]
    pub stacktrace: Option<String>,

    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// EventMessage
// ============================================================================

/// An inbound `type = "event"` message.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event payload.
    pub params: Value,

    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Command completed.
    Success(SuccessResponse),
    /// Command failed on the remote end.
    Error(ErrorResponse),
    /// Spontaneous notification.
    Event(EventMessage),
}

impl InboundMessage {
    /// Classifies one inbound text message by its `type` field.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolViolation`] for malformed JSON, a missing or
    /// unknown `type`, or a message body that does not match its declared
    /// type. Violations are expected to be logged and dropped by the
    /// caller; one bad frame must not kill the session.
    pub fn classify(text: &str) -> StdResult<Self, ProtocolViolation> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolViolation::Malformed)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);

        match kind.as_deref() {
            Some("success") => serde_json::from_value(value)
                .map(Self::Success)
                .map_err(ProtocolViolation::Malformed),
            Some("error") => serde_json::from_value(value)
                .map(Self::Error)
                .map_err(ProtocolViolation::Malformed),
            Some("event") => serde_json::from_value(value)
                .map(Self::Event)
                .map_err(ProtocolViolation::Malformed),
            _ => Err(ProtocolViolation::UnknownType { kind }),
        }
    }
}

// ============================================================================
// ProtocolViolation
// ============================================================================

/// An inbound message the core refuses to act on.
///
/// Never surfaced to callers: the dispatcher logs the violation and drops
/// the message.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    /// The text was not valid JSON, or did not match its declared shape.
    #[error("malformed message: {0}")]
    Malformed(serde_json::Error),

    /// The `type` field was missing or not one of `success`/`error`/`event`.
    #[error("unknown message type: {kind:?}")]
    UnknownType {
        /// The unrecognized `type` value, if one was present.
        kind: Option<String>,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_envelope_serialization() {
        let envelope = CommandEnvelope {
            id: CommandId::new(1),
            method: "session.status".to_owned(),
            params: json!({}),
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            value,
            json!({ "id": 1, "method": "session.status", "params": {} })
        );
    }

    #[test]
    fn test_classify_success() {
        let text = r#"{"type":"success","id":1,"result":{"ready":true}}"#;
        let message = InboundMessage::classify(text).expect("classify");
        match message {
            InboundMessage::Success(response) => {
                assert_eq!(response.id, CommandId::new(1));
                assert_eq!(response.result, json!({ "ready": true }));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_error() {
        let text = r#"{"type":"error","id":3,"error":"invalid argument","message":"bad url"}"#;
        let message = InboundMessage::classify(text).expect("classify");
        match message {
            InboundMessage::Error(response) => {
                assert_eq!(response.id, Some(CommandId::new(3)));
                assert_eq!(response.error, "invalid argument");
                assert_eq!(response.message, "bad url");
                assert_eq!(response.stacktrace, None);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_error_with_null_id() {
        let text = r#"{"type":"error","id":null,"error":"invalid argument","message":"unparseable"}"#;
        let message = InboundMessage::classify(text).expect("classify");
        match message {
            InboundMessage::Error(response) => assert_eq!(response.id, None),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_event() {
        let text = r#"{"type":"event","method":"log.entryAdded","params":{"level":"info"}}"#;
        let message = InboundMessage::classify(text).expect("classify");
        match message {
            InboundMessage::Event(event) => {
                assert_eq!(event.method, "log.entryAdded");
                assert_eq!(event.params, json!({ "level": "info" }));
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_malformed_json() {
        let result = InboundMessage::classify("{not json");
        assert!(matches!(result, Err(ProtocolViolation::Malformed(_))));
    }

    #[test]
    fn test_classify_unknown_type() {
        let result = InboundMessage::classify(r#"{"type":"banana","id":1}"#);
        match result {
            Err(ProtocolViolation::UnknownType { kind }) => {
                assert_eq!(kind.as_deref(), Some("banana"));
            }
            other => panic!("expected unknown type, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_missing_type() {
        let result = InboundMessage::classify(r#"{"id":1,"result":{}}"#);
        assert!(matches!(
            result,
            Err(ProtocolViolation::UnknownType { kind: None })
        ));
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let text = r#"{"type":"success","id":1,"result":{},"vendor:meta":{"x":1}}"#;
        let message = InboundMessage::classify(text).expect("classify");
        match message {
            InboundMessage::Success(response) => {
                assert!(response.extra.contains_key("vendor:meta"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
