//! Remote UI Bridge - WebSocket stand-in for the native invoke/listen bridge.
//!
//! In browser-only end-to-end runs there is no native IPC bridge. This crate
//! provides the same `invoke`/`listen` surface over a single reconnecting
//! WebSocket to a local test harness:
//!
//! - Transport: one socket, at most one connection attempt in flight, a fixed
//!   retry cooldown that restarts on every close or error
//! - Commands: correlation ids, a pending-call table and a hard per-call timeout
//! - Events: per-socket listeners keyed by event name
//!
//! When the host exposes a native bridge, calls go straight to it instead.

pub mod bridge;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod ports;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


pub use bridge::UiBridge;
pub use config::{BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use infrastructure::host::{HostGlobals, ShimOnlyHost, NATIVE_BRIDGE_GLOBALS};
pub use infrastructure::messaging::{ListenOptions, Unlisten};
pub use infrastructure::websocket::{ConnectionState, Connector, WebSocketConnector};
pub use ports::outbound::{HostEnvironment, NativeBridge};
pub use remote_ui_protocol::EventFrame;
