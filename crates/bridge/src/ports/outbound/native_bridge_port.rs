//! Native Bridge Port - the host's own invoke implementation
//!
//! When the host exposes a native bridge, every command goes straight to it and
//! the socket shim is never engaged. The signature mirrors the shim's `invoke`
//! so application code is agnostic to which transport is active.
//!
//! Note: the async method uses `async_trait` for mockall compatibility.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BridgeError;

/// Native invoke capability exposed by the host.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Invoke a native command.
    ///
    /// Errors are returned to the caller unchanged; implementations map
    /// string/object failures to [`BridgeError::Remote`].
    async fn invoke(
        &self,
        command: &str,
        args: Option<Value>,
        options: Option<Value>,
    ) -> Result<Value, BridgeError>;
}

/// Looks up a native bridge in the host environment.
///
/// Consulted before every command and listen call, so a bridge that appears
/// later takes over from the shim immediately.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait HostEnvironment: Send + Sync {
    fn native_bridge(&self) -> Option<Arc<dyn NativeBridge>>;
}
