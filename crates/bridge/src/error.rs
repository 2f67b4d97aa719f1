//! Error types surfaced to bridge callers.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by `invoke`, `listen` and the harness readiness wait.
///
/// Remote failures carry the harness payload verbatim so callers see whatever
/// structure the backend used for its error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The socket never reached the open state (cooldown, failed connect, closed)
    #[error("no transport available: remote UI socket is not open")]
    NoTransport,

    /// No matching response arrived in time
    #[error("invoke timeout: command `{command}` got no response within {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The harness answered with a non-success status
    #[error("remote error: {0}")]
    Remote(Value),

    /// `listen` was called while a native bridge is present
    #[error("listen is not available through the socket bridge while a native bridge is present")]
    NativeListenUnsupported,

    /// The response body could not be decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The settlement channel was dropped before a response arrived
    #[error("request was cancelled before a response arrived")]
    Cancelled,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("harness at {url} did not become ready within {waited_ms}ms")]
    HarnessUnavailable { url: String, waited_ms: u64 },
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeout_message_names_command() {
        let err = BridgeError::Timeout {
            command: "slow_command".to_string(),
            timeout_ms: 30_000,
        };
        let message = err.to_string();
        assert!(message.contains("slow_command"));
        assert!(message.contains("30000"));
    }

    #[test]
    fn test_remote_error_keeps_payload() {
        let err = BridgeError::Remote(json!({ "code": 42 }));
        assert_eq!(err, BridgeError::Remote(json!({ "code": 42 })));
    }
}
