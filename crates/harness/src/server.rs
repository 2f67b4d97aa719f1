//! Mock harness server: the `/remote_ui_ws` command socket and the
//! `/remote_ui_info` readiness endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use remote_ui_protocol::{
    CommandFrame, EventMessage, WireResponse, REMOTE_UI_INFO_PATH, REMOTE_UI_WS_PATH,
};

use crate::commands::CommandTable;
use crate::connections::ConnectionManager;
use crate::error::HarnessError;

/// Buffer size for each socket's outbound queue.
const CONNECTION_CHANNEL_BUFFER: usize = 64;

pub const HARNESS_NAME: &str = "remote-ui-harness";

pub struct HarnessState {
    pub commands: CommandTable,
    pub connections: ConnectionManager,
}

#[derive(Debug, Serialize)]
struct HarnessInfo {
    name: &'static str,
    version: &'static str,
    connections: usize,
}

pub fn router(state: Arc<HarnessState>) -> Router {
    Router::new()
        .route(REMOTE_UI_WS_PATH, get(ws_handler))
        .route(REMOTE_UI_INFO_PATH, get(info_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn info_handler(State(state): State<Arc<HarnessState>>) -> Json<HarnessInfo> {
    Json(HarnessInfo {
        name: HARNESS_NAME,
        version: env!("CARGO_PKG_VERSION"),
        connections: state.connections.count().await,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<HarnessState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<HarnessState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // The registry holds the only sender, so dropping the registration closes the socket.
    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_CHANNEL_BUFFER);
    state.connections.register(connection_id, tx).await;
    tracing::info!(connection_id = %connection_id, "Bridge socket connected");

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_frame(text.as_str(), &state, connection_id).await;
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "Bridge socket closed by client");
                break;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.connections.unregister(connection_id).await;
    send_task.abort();
    tracing::info!(connection_id = %connection_id, "Bridge socket terminated");
}

async fn handle_frame(text: &str, state: &HarnessState, connection_id: Uuid) {
    let frame: CommandFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Failed to parse command frame");
            return;
        }
    };
    tracing::debug!(connection_id = %connection_id, request_id = frame.id, command = %frame.cmd, "Command received");

    let Some(envelope) = state.commands.respond(&frame) else {
        return;
    };

    let encoded = WireResponse::new(frame.id, &envelope)
        .and_then(|response| serde_json::to_string(&response));
    match encoded {
        Ok(text) => {
            if !state.connections.send_to(connection_id, text).await {
                tracing::warn!(
                    connection_id = %connection_id,
                    request_id = frame.id,
                    "Failed to send response, channel full or closed"
                );
            }
        }
        Err(e) => {
            tracing::error!(request_id = frame.id, error = %e, "Failed to encode response");
        }
    }
}

/// A running harness.
pub struct HarnessHandle {
    addr: SocketAddr,
    state: Arc<HarnessState>,
    task: JoinHandle<()>,
}

impl HarnessHandle {
    /// Bind `addr` and serve in a background task.
    pub async fn spawn(addr: SocketAddr, commands: CommandTable) -> Result<Self, HarnessError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HarnessError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| HarnessError::Bind { addr, source })?;

        let state = Arc::new(HarnessState {
            commands,
            connections: ConnectionManager::new(),
        });
        let app = router(Arc::clone(&state));

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Harness server stopped");
            }
        });
        tracing::info!(%addr, "Remote UI harness listening");

        Ok(Self { addr, state, task })
    }

    /// Serve on an ephemeral loopback port.
    pub async fn spawn_local(commands: CommandTable) -> Result<Self, HarnessError> {
        Self::spawn(SocketAddr::from(([127, 0, 0, 1], 0)), commands).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, REMOTE_UI_WS_PATH)
    }

    pub fn info_url(&self) -> String {
        format!("http://{}{}", self.addr, REMOTE_UI_INFO_PATH)
    }

    pub fn commands(&self) -> &CommandTable {
        &self.state.commands
    }

    pub async fn connection_count(&self) -> usize {
        self.state.connections.count().await
    }

    /// Push `{"event", "payload"}` to every connected socket.
    pub async fn emit(&self, event: &str, payload: Value) -> Result<usize, HarnessError> {
        let text = serde_json::to_string(&EventMessage::new(event, payload))?;
        let delivered = self.state.connections.broadcast(&text).await;
        tracing::debug!(event, delivered, "Event emitted");
        Ok(delivered)
    }

    /// Close every open socket from the server side.
    pub async fn disconnect_all(&self) -> usize {
        self.state.connections.disconnect_all().await
    }

    /// Wait for the server task; it only ends on a serve error.
    pub async fn wait(&mut self) {
        let _ = (&mut self.task).await;
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}
