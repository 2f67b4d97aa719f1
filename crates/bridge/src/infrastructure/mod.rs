//! Infrastructure layer - socket transport, messaging and host adapters

pub mod harness_ready;
pub mod host;
pub mod messaging;
pub mod websocket;
