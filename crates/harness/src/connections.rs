//! Registry of open harness sockets.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outbound text-frame queues, one per connected socket.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, mpsc::Sender<String>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: Uuid, sender: mpsc::Sender<String>) {
        self.connections.write().await.insert(connection_id, sender);
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    pub async fn unregister(&self, connection_id: Uuid) {
        if self.connections.write().await.remove(&connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue `text` on one socket. False if it is gone or its queue is full.
    pub async fn send_to(&self, connection_id: Uuid, text: String) -> bool {
        match self.connections.read().await.get(&connection_id) {
            Some(sender) => sender.try_send(text).is_ok(),
            None => false,
        }
    }

    /// Queue `text` on every socket. Returns how many accepted it.
    pub async fn broadcast(&self, text: &str) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (connection_id, sender) in connections.iter() {
            if sender.try_send(text.to_string()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(
                    connection_id = %connection_id,
                    "Failed to queue broadcast, channel full or closed"
                );
            }
        }
        delivered
    }

    /// Drop every sender; each socket's writer finishes and the socket closes.
    pub async fn disconnect_all(&self) -> usize {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        connections.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let manager = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.register(Uuid::new_v4(), tx1).await;
        manager.register(Uuid::new_v4(), tx2).await;

        assert_eq!(manager.broadcast("hello").await, 2);
        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_unregistered_connection_is_skipped() {
        let manager = ConnectionManager::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(4);
        manager.register(id, tx).await;
        manager.unregister(id).await;

        assert_eq!(manager.count().await, 0);
        assert_eq!(manager.broadcast("hello").await, 0);
    }
}
