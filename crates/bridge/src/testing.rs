//! In-memory connector and harness peer for tests.
//!
//! `ChannelConnector` stands in for the WebSocket connector: every successful
//! connect hands the harness side of the socket to the test as a
//! [`FakeHarnessSocket`]. Dropping or closing that peer closes the socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use remote_ui_protocol::{CommandFrame, EventMessage, ResponseEnvelope, WireResponse};

use crate::error::BridgeError;
use crate::infrastructure::websocket::{Connector, FrameChannel, FRAME_CHANNEL_BUFFER};

/// Connector whose sockets are in-memory channel pairs.
pub struct ChannelConnector {
    attempts: AtomicUsize,
    refusing: AtomicBool,
    sockets: mpsc::UnboundedSender<FakeHarnessSocket>,
}

impl ChannelConnector {
    /// Connector that accepts every attempt.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeHarnessSocket>) {
        Self::build(false)
    }

    /// Connector that refuses every attempt, as if nothing listens on the port.
    pub fn refusing() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeHarnessSocket>) {
        Self::build(true)
    }

    fn build(refusing: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeHarnessSocket>) {
        let (sockets, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            refusing: AtomicBool::new(refusing),
            sockets,
        });
        (connector, accepted)
    }

    /// Number of connect calls so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, url: &str) -> Result<FrameChannel, BridgeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(BridgeError::Connect(format!("connection refused: {}", url)));
        }

        let (outbound, from_client) = mpsc::channel(FRAME_CHANNEL_BUFFER);
        let (to_client, inbound) = mpsc::channel(FRAME_CHANNEL_BUFFER);

        // If the test dropped its receiver the peer is dropped too and the socket closes.
        let _ = self.sockets.send(FakeHarnessSocket {
            from_client,
            to_client,
        });

        Ok(FrameChannel { outbound, inbound })
    }
}

/// Harness side of an in-memory socket.
pub struct FakeHarnessSocket {
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<String>,
}

impl FakeHarnessSocket {
    /// Next command frame sent by the client.
    ///
    /// Panics if the client side is gone or the frame is not a command.
    pub async fn next_command(&mut self) -> CommandFrame {
        let text = self
            .from_client
            .recv()
            .await
            .expect("client socket closed before sending a command");
        serde_json::from_str(&text).expect("client sent a malformed command frame")
    }

    /// Answer a command with a double-encoded envelope.
    pub async fn respond(&self, id: u64, envelope: &ResponseEnvelope) {
        let wire = WireResponse::new(id, envelope).expect("envelope encodes");
        let text = serde_json::to_string(&wire).expect("response frame encodes");
        self.push_raw(&text).await;
    }

    pub async fn respond_success(&self, id: u64, payload: Value) {
        self.respond(id, &ResponseEnvelope::success(payload)).await;
    }

    pub async fn respond_error(&self, id: u64, payload: Value) {
        self.respond(id, &ResponseEnvelope::error(payload)).await;
    }

    /// Push an event frame `{"event", "payload"}`.
    pub async fn push_event(&self, event: &str, payload: Value) {
        let text = serde_json::to_string(&EventMessage::new(event, payload))
            .expect("event frame encodes");
        self.push_raw(&text).await;
    }

    /// Push an arbitrary text frame.
    pub async fn push_raw(&self, text: &str) {
        // A closed client is not an error for the harness side
        let _ = self.to_client.send(text.to_string()).await;
    }

    /// Close the socket from the harness side.
    ///
    /// Consuming `self` drops both channel ends, which is what closes the
    /// socket; dropping the peer any other way has the same effect.
    pub fn close(self) {
        tracing::debug!("Fake harness socket closed");
    }
}
