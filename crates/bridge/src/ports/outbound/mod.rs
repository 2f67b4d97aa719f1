//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that host adapters must implement,
//! allowing the bridge to defer to a native implementation when one exists.

pub mod native_bridge_port;

pub use native_bridge_port::{HostEnvironment, NativeBridge};

#[cfg(any(test, feature = "testing"))]
pub use native_bridge_port::{MockHostEnvironment, MockNativeBridge};
