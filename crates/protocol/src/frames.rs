//! Command and inbound frame types.
//!
//! Inbound frames are discriminated by shape (a correlation id vs. an event name),
//! not by an explicit tag. `parse_inbound_frame` performs that discrimination once
//! and hands back an `InboundFrame` variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::envelope::ResponseEnvelope;

// =============================================================================
// Outbound
// =============================================================================

/// Outbound command frame: `{id, cmd, args, options}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Correlation id, unique for the lifetime of the client
    pub id: u64,
    /// Command name
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Opaque invoke options, forwarded as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

// =============================================================================
// Inbound
// =============================================================================

/// Decoded body of a response frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Envelope status was `"success"`
    Success(Value),
    /// Any other status; carries the remote payload verbatim
    Failure(Value),
    /// The envelope could not be decoded
    Malformed(String),
}

impl ResponseBody {
    /// Decode the `payload` field of a response frame.
    ///
    /// The harness sends the envelope as a JSON string; an already-structured
    /// object is accepted as well.
    fn from_raw(raw: Value) -> Self {
        let envelope = match raw {
            Value::String(text) => serde_json::from_str::<ResponseEnvelope>(&text),
            other @ Value::Object(_) => serde_json::from_value::<ResponseEnvelope>(other),
            other => {
                return ResponseBody::Malformed(format!(
                    "response payload must be a JSON string or object, got {}",
                    other
                ))
            }
        };

        match envelope {
            Ok(envelope) if envelope.is_success() => ResponseBody::Success(envelope.payload),
            Ok(envelope) => ResponseBody::Failure(envelope.payload),
            Err(e) => ResponseBody::Malformed(e.to_string()),
        }
    }
}

/// A response to a previously sent command.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: u64,
    pub body: ResponseBody,
}

/// A server-pushed event. The full frame is kept because listeners receive it whole.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub name: String,
    pub frame: Value,
}

impl EventFrame {
    /// The frame's `payload` field, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.frame.get("payload")
    }
}

/// Inbound frame after shape discrimination.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response(ResponseFrame),
    Event(EventFrame),
    /// Valid JSON carrying neither an event name nor a correlation id
    Unrecognized(Value),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid correlation id: {0}")]
    InvalidId(Value),
}

/// Parse a text frame and lift it into an [`InboundFrame`] variant.
///
/// A string `event` field wins over an `id` field, since event frames may carry
/// their own event ids.
pub fn parse_inbound_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let mut value: Value = serde_json::from_str(text)?;

    if let Some(name) = value.get("event").and_then(Value::as_str) {
        return Ok(InboundFrame::Event(EventFrame {
            name: name.to_string(),
            frame: value,
        }));
    }

    let id = match value.get("id") {
        None | Some(Value::Null) => return Ok(InboundFrame::Unrecognized(value)),
        Some(id) => id
            .as_u64()
            .ok_or_else(|| FrameError::InvalidId(id.clone()))?,
    };

    let raw_payload = value
        .get_mut("payload")
        .map(Value::take)
        .unwrap_or(Value::Null);

    Ok(InboundFrame::Response(ResponseFrame {
        id,
        body: ResponseBody::from_raw(raw_payload),
    }))
}
