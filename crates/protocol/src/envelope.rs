//! Response envelope and server-side message shapes.
//!
//! The harness wraps every command result in a `{status, payload}` envelope and
//! then JSON-encodes that envelope a second time into the `payload` string of the
//! response frame. The double encoding is part of the wire format and must be kept.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope status for a successful command.
pub const STATUS_SUCCESS: &str = "success";

/// Envelope status used by the harness for failed commands.
///
/// Any status other than [`STATUS_SUCCESS`] is treated as a failure by the client.
pub const STATUS_ERROR: &str = "error";

/// The inner `{status, payload}` object of a response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: String,
    #[serde(default)]
    pub payload: Value,
}

impl ResponseEnvelope {
    /// Create a success envelope
    pub fn success(payload: Value) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            payload,
        }
    }

    /// Create an error envelope
    pub fn error(payload: Value) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// A response frame as it travels on the wire: `{"id": 1, "payload": "<json>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: u64,
    /// JSON-encoded [`ResponseEnvelope`]
    pub payload: String,
}

impl WireResponse {
    /// Encode an envelope into its wire form for the given correlation id.
    pub fn new(id: u64, envelope: &ResponseEnvelope) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            payload: serde_json::to_string(envelope)?,
        })
    }
}

/// A server-pushed event: `{"event": "name", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_response_double_encodes_envelope() {
        let envelope = ResponseEnvelope::success(json!({ "max_cpu_available": 100 }));
        let wire = WireResponse::new(7, &envelope).unwrap();

        let text = serde_json::to_string(&wire).unwrap();
        let outer: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(outer["id"], json!(7));
        assert!(outer["payload"].is_string());

        let inner: ResponseEnvelope =
            serde_json::from_str(outer["payload"].as_str().unwrap()).unwrap();
        assert!(inner.is_success());
        assert_eq!(inner.payload["max_cpu_available"], json!(100));
    }

    #[test]
    fn test_error_envelope_is_not_success() {
        let envelope = ResponseEnvelope::error(json!("boom"));
        assert!(!envelope.is_success());
        assert_eq!(envelope.status, STATUS_ERROR);
    }

    #[test]
    fn test_envelope_missing_payload_defaults_to_null() {
        let envelope: ResponseEnvelope = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(envelope.payload, Value::Null);
    }
}
