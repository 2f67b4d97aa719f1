//! Socket connectors.
//!
//! A connector opens the duplex socket and hands back a pair of text-frame
//! channels. The transport never touches the socket type directly, so tests can
//! swap in an in-memory connector.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::BridgeError;

/// Buffer size for each direction of a frame channel.
pub const FRAME_CHANNEL_BUFFER: usize = 32;

/// Text frames flowing to and from an open socket.
///
/// The inbound receiver yields `None` once the socket is closed or errored.
pub struct FrameChannel {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens the duplex socket to the harness.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameChannel, BridgeError>;
}

/// Desktop connector using tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<FrameChannel, BridgeError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| BridgeError::Connect(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_BUFFER);

        let write_handle = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::error!(error = %e, "Failed to send frame");
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if inbound_tx.send(text).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Harness closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Reader gone means the socket is gone; stop accepting outbound frames.
            write_handle.abort();
        });

        Ok(FrameChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
