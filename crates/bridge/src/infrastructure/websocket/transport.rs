//! Transport manager for the single harness socket.
//!
//! Guarantees at most one live socket and at most one in-flight connection
//! attempt, and rate-limits attempts with a fixed cooldown. Dependents call
//! `ensure_connection` and then `wait_ready`; there is no retry loop here, a
//! new attempt only happens when a dependent asks again after the cooldown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;

use remote_ui_protocol::{parse_inbound_frame, InboundFrame};

use super::connector::{Connector, FrameChannel};
use crate::error::BridgeError;
use crate::infrastructure::messaging::{EventListeners, PendingCalls};
use crate::ports::outbound::HostEnvironment;

/// Observable state of the harness socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket and no attempt in flight
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Socket is open
    Connected,
}

/// Handle to the open socket.
///
/// Event listeners live on the socket: when it closes they stop receiving
/// frames, and a later socket starts with an empty registry.
#[derive(Clone)]
pub struct SocketHandle {
    generation: u64,
    outbound: mpsc::Sender<String>,
    listeners: Arc<EventListeners>,
}

impl SocketHandle {
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Connection attempt this socket came from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a text frame for the writer task.
    pub async fn send(&self, text: String) -> Result<(), BridgeError> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| BridgeError::NoTransport)
    }

    pub fn listeners(&self) -> &Arc<EventListeners> {
        &self.listeners
    }
}

#[derive(Default)]
struct TransportState {
    socket: Option<SocketHandle>,
    ready: Option<watch::Receiver<ConnectionState>>,
    connecting: bool,
    last_attempt: Option<Instant>,
    generation: u64,
}

/// Owner of the harness socket lifecycle.
#[derive(Clone)]
pub struct Transport {
    url: String,
    retry_cooldown: Duration,
    host: Arc<dyn HostEnvironment>,
    connector: Arc<dyn Connector>,
    pending: Arc<Mutex<PendingCalls>>,
    state: Arc<Mutex<TransportState>>,
}

impl Transport {
    pub fn new(
        url: impl Into<String>,
        retry_cooldown: Duration,
        host: Arc<dyn HostEnvironment>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            url: url.into(),
            retry_cooldown,
            host,
            connector,
            pending: Arc::new(Mutex::new(PendingCalls::default())),
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pending-call table that inbound responses are routed into.
    pub fn pending(&self) -> Arc<Mutex<PendingCalls>> {
        Arc::clone(&self.pending)
    }

    /// Start a connection attempt unless one is unnecessary or rate-limited.
    ///
    /// Never fails: connection errors are logged and surface to dependents as a
    /// socket that is not open after `wait_ready`.
    pub async fn ensure_connection(&self) {
        if self.host.native_bridge().is_some() {
            return;
        }

        let (generation, ready_tx) = {
            let mut state = self.state.lock().await;
            if state.socket.is_some() || state.ready.is_some() || state.connecting {
                return;
            }

            if let Some(last_attempt) = state.last_attempt {
                let elapsed = last_attempt.elapsed();
                if elapsed < self.retry_cooldown {
                    tracing::debug!(
                        url = %self.url,
                        elapsed_ms = elapsed.as_millis() as u64,
                        cooldown_ms = self.retry_cooldown.as_millis() as u64,
                        "Connection attempt skipped - retry cooldown in effect"
                    );
                    return;
                }
            }

            state.last_attempt = Some(Instant::now());
            state.connecting = true;
            state.generation += 1;

            let (ready_tx, ready_rx) = watch::channel(ConnectionState::Connecting);
            state.ready = Some(ready_rx);
            (state.generation, ready_tx)
        };

        let transport = self.clone();
        tokio::spawn(async move {
            transport.run_connection(generation, ready_tx).await;
        });
    }

    /// Await the in-flight attempt (if any) and return the socket if it is open.
    pub async fn wait_ready(&self) -> Option<SocketHandle> {
        let ready = self.state.lock().await.ready.clone();
        if let Some(mut ready) = ready {
            // An Err means the attempt's task is gone; the socket check below decides.
            let _ = ready
                .wait_for(|state| *state != ConnectionState::Connecting)
                .await;
        }

        self.state
            .lock()
            .await
            .socket
            .clone()
            .filter(SocketHandle::is_open)
    }

    /// Current state. A socket counts as connected until its close is processed.
    pub async fn state(&self) -> ConnectionState {
        let state = self.state.lock().await;
        if state.socket.is_some() {
            ConnectionState::Connected
        } else if state.connecting {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn run_connection(self, generation: u64, ready_tx: watch::Sender<ConnectionState>) {
        tracing::info!(url = %self.url, generation, "Connecting to remote UI harness");

        let FrameChannel {
            outbound,
            mut inbound,
        } = match self.connector.connect(&self.url).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Failed to connect to remote UI harness");
                self.teardown(generation).await;
                let _ = ready_tx.send(ConnectionState::Disconnected);
                return;
            }
        };

        let socket = SocketHandle {
            generation,
            outbound,
            listeners: Arc::new(EventListeners::default()),
        };

        {
            let mut state = self.state.lock().await;
            state.connecting = false;
            state.socket = Some(socket.clone());
        }
        let _ = ready_tx.send(ConnectionState::Connected);
        tracing::info!(url = %self.url, generation, "Connected to remote UI harness");

        while let Some(text) = inbound.recv().await {
            self.route_frame(&socket, &text).await;
        }

        tracing::info!(url = %self.url, generation, "Remote UI socket closed");
        self.teardown(generation).await;
        let _ = ready_tx.send(ConnectionState::Disconnected);
    }

    /// Route one inbound frame: responses to the pending table, events to the
    /// socket's listeners.
    async fn route_frame(&self, socket: &SocketHandle, text: &str) {
        match parse_inbound_frame(text) {
            Ok(InboundFrame::Response(response)) => {
                self.pending.lock().await.resolve(response);
            }
            Ok(InboundFrame::Event(event)) => {
                let delivered = socket.listeners.dispatch(&event);
                tracing::trace!(event = %event.name, delivered, "Event frame dispatched");
            }
            Ok(InboundFrame::Unrecognized(frame)) => {
                tracing::debug!(%frame, "Ignoring frame without id or event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse inbound frame");
            }
        }
    }

    /// Clear the socket after close or error; the cooldown restarts now.
    async fn teardown(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        state.socket = None;
        state.ready = None;
        state.connecting = false;
        state.last_attempt = Some(Instant::now());
    }
}
