//! Remote UI Protocol - Wire frames for the remote-ui WebSocket bridge
//!
//! This crate contains the frame types exchanged between the bridge shim
//! (client) and the test harness (server):
//! - Outbound command frames (`CommandFrame`)
//! - Inbound frames lifted into a tagged `InboundFrame` at the parse boundary
//! - The double-encoded response envelope (`ResponseEnvelope`)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, and thiserror
//! 2. **No transport logic** - Pure data types and serialization
//! 3. **Shape discrimination happens once** - downstream code matches on variants

pub mod envelope;
pub mod frames;

pub use envelope::{EventMessage, ResponseEnvelope, WireResponse, STATUS_ERROR, STATUS_SUCCESS};
pub use frames::{
    parse_inbound_frame, CommandFrame, EventFrame, FrameError, InboundFrame, ResponseBody,
    ResponseFrame,
};

/// Path of the harness WebSocket endpoint.
pub const REMOTE_UI_WS_PATH: &str = "/remote_ui_ws";

/// Path of the harness readiness/info endpoint.
pub const REMOTE_UI_INFO_PATH: &str = "/remote_ui_info";

/// Default port the harness listens on.
pub const DEFAULT_HARNESS_PORT: u16 = 9515;
