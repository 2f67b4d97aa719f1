//! WebSocket transport to the remote UI harness.

mod connector;
mod transport;

pub use connector::{Connector, FrameChannel, WebSocketConnector, FRAME_CHANNEL_BUFFER};
pub use transport::{ConnectionState, SocketHandle, Transport};
