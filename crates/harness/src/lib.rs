//! Remote UI Harness - a stand-in for the desktop backend's remote-ui socket.
//!
//! Serves the same two endpoints the real backend exposes in test mode:
//! - `/remote_ui_ws`: command frames in, double-encoded responses and events out
//! - `/remote_ui_info`: readiness/info JSON
//!
//! Commands are answered from a [`CommandTable`]; events are pushed with
//! [`HarnessHandle::emit`].

pub mod commands;
pub mod config;
pub mod connections;
pub mod error;
pub mod server;

pub use commands::{CommandHandler, CommandTable};
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use server::{router, HarnessHandle, HarnessState, HARNESS_NAME};
