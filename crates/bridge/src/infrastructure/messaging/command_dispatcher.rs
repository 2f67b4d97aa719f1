//! Command Dispatcher for one-shot commands.
//!
//! Each call gets a process-unique correlation id, a pending-table entry and an
//! independent timeout that starts at send time. The entry is removed exactly
//! once: by the matching response or by the timeout, whichever comes first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use remote_ui_protocol::{CommandFrame, ResponseBody, ResponseFrame};

use crate::error::BridgeError;
use crate::infrastructure::websocket::Transport;
use crate::ports::outbound::HostEnvironment;

/// Outcome delivered to a waiting caller.
pub type Settlement = Result<Value, BridgeError>;

/// Pending call tracker for request-response correlation
#[derive(Default)]
pub struct PendingCalls {
    inner: HashMap<u64, oneshot::Sender<Settlement>>,
}

impl PendingCalls {
    pub fn insert(&mut self, id: u64, tx: oneshot::Sender<Settlement>) {
        self.inner.insert(id, tx);
    }

    /// Settle a pending call with its response.
    ///
    /// Returns false if no call is pending under this id (already timed out, or
    /// never sent by us); such responses are dropped.
    pub fn resolve(&mut self, response: ResponseFrame) -> bool {
        let Some(tx) = self.inner.remove(&response.id) else {
            tracing::debug!(
                request_id = response.id,
                "Response received for unknown request ID - request may have timed out"
            );
            return false;
        };

        let settlement = match response.body {
            ResponseBody::Success(payload) => Ok(payload),
            ResponseBody::Failure(payload) => Err(BridgeError::Remote(payload)),
            ResponseBody::Malformed(reason) => Err(BridgeError::Protocol(reason)),
        };
        // The receiver is gone only if the caller's future was dropped.
        let _ = tx.send(settlement);
        true
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.inner.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes a pending entry if the `invoke` future is dropped before it settles.
struct PendingGuard {
    id: u64,
    pending: Arc<Mutex<PendingCalls>>,
    armed: bool,
}

impl PendingGuard {
    fn new(id: u64, pending: Arc<Mutex<PendingCalls>>) -> Self {
        Self {
            id,
            pending,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        if let Ok(mut pending) = self.pending.try_lock() {
            pending.remove(id);
        } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pending = Arc::clone(&self.pending);
            handle.spawn(async move {
                pending.lock().await.remove(id);
            });
        } else {
            tracing::warn!(request_id = id, "Abandoned call left in pending table, no runtime to clean up");
            return;
        }
        tracing::debug!(request_id = id, "Abandoned call removed from pending table");
    }
}

/// Sends commands and correlates their responses.
///
/// Cheap to clone; clones share the transport, pending table and id counter.
#[derive(Clone)]
pub struct CommandDispatcher {
    host: Arc<dyn HostEnvironment>,
    transport: Transport,
    pending: Arc<Mutex<PendingCalls>>,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(host: Arc<dyn HostEnvironment>, transport: Transport, timeout: Duration) -> Self {
        let pending = transport.pending();
        Self {
            host,
            transport,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            timeout,
        }
    }

    /// Invoke a command and await its correlated response.
    ///
    /// With a native bridge present the call is delegated to it unchanged.
    pub async fn invoke(
        &self,
        command: &str,
        args: Option<Value>,
        options: Option<Value>,
    ) -> Result<Value, BridgeError> {
        if let Some(native) = self.host.native_bridge() {
            return native.invoke(command, args, options).await;
        }

        self.transport.ensure_connection().await;
        let Some(socket) = self.transport.wait_ready().await else {
            tracing::error!(command, url = %self.transport.url(), "No transport available for command");
            return Err(BridgeError::NoTransport);
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = CommandFrame {
            id,
            cmd: command.to_string(),
            args,
            options,
        };
        let text = serde_json::to_string(&frame)?;

        let (response_tx, response_rx) = oneshot::channel();

        // Register before sending so a fast response always finds its entry
        self.pending.lock().await.insert(id, response_tx);
        let mut guard = PendingGuard::new(id, Arc::clone(&self.pending));

        if let Err(e) = socket.send(text).await {
            self.pending.lock().await.remove(id);
            guard.disarm();
            tracing::error!(request_id = id, command, "Failed to send command frame");
            return Err(e);
        }
        tracing::debug!(request_id = id, command, "Command sent");

        let outcome = tokio::time::timeout(self.timeout, response_rx).await;
        if outcome.is_err() {
            // Timeout occurred - clean up the pending entry to prevent memory growth
            self.pending.lock().await.remove(id);
        }
        guard.disarm();

        match outcome {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => Err(BridgeError::Cancelled),
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::error!(request_id = id, command, timeout_ms, "Invoke timed out");
                Err(BridgeError::Timeout {
                    command: command.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::host::ShimOnlyHost;
    use crate::ports::outbound::{MockHostEnvironment, MockNativeBridge, NativeBridge};
    use crate::testing::{ChannelConnector, FakeHarnessSocket};
    use futures_util::future::join_all;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_millis(30_000);

    fn dispatcher(connector: Arc<ChannelConnector>) -> CommandDispatcher {
        let host: Arc<dyn HostEnvironment> = Arc::new(ShimOnlyHost);
        let transport = Transport::new(
            "ws://test/remote_ui_ws",
            Duration::from_millis(2_000),
            Arc::clone(&host),
            connector,
        );
        CommandDispatcher::new(host, transport, TIMEOUT)
    }

    async fn connected() -> (CommandDispatcher, FakeHarnessSocket) {
        let (connector, mut harness) = ChannelConnector::new();
        let dispatcher = dispatcher(connector);
        dispatcher.transport.ensure_connection().await;
        dispatcher.transport.wait_ready().await.unwrap();
        let socket = harness.recv().await.unwrap();
        (dispatcher, socket)
    }

    #[test]
    fn test_resolve_unknown_id_is_ignored() {
        let mut pending = PendingCalls::default();
        let resolved = pending.resolve(ResponseFrame {
            id: 42,
            body: ResponseBody::Success(json!(null)),
        });
        assert!(!resolved);
    }

    #[test]
    fn test_resolve_maps_failure_and_malformed_bodies() {
        let mut pending = PendingCalls::default();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        pending.insert(1, tx1);
        pending.insert(2, tx2);

        assert!(pending.resolve(ResponseFrame {
            id: 1,
            body: ResponseBody::Failure(json!("wallet locked")),
        }));
        assert!(pending.resolve(ResponseFrame {
            id: 2,
            body: ResponseBody::Malformed("bad".to_string()),
        }));

        assert_eq!(
            rx1.try_recv().unwrap(),
            Err(BridgeError::Remote(json!("wallet locked")))
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            Err(BridgeError::Protocol("bad".to_string()))
        );
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_resolves_scenario_payload() {
        let (dispatcher, mut socket) = connected().await;

        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("get_max_consumption_levels", None, None).await }
        });

        let frame = socket.next_command().await;
        assert_eq!(frame.cmd, "get_max_consumption_levels");
        assert_eq!(frame.id, 1);
        socket
            .push_raw(r#"{"id":1,"payload":"{\"status\":\"success\",\"payload\":{\"max_cpu_available\":100,\"max_gpu_available\":50}}"}"#)
            .await;

        let result = call.await.unwrap().unwrap();
        assert_eq!(
            result,
            json!({ "max_cpu_available": 100, "max_gpu_available": 50 })
        );
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_invoke_forwards_args_and_options() {
        let (dispatcher, mut socket) = connected().await;

        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move {
                dispatcher
                    .invoke(
                        "set_cpu_mining_enabled",
                        Some(json!({ "enabled": true })),
                        Some(json!({ "headers": {} })),
                    )
                    .await
            }
        });

        let frame = socket.next_command().await;
        assert_eq!(frame.args, Some(json!({ "enabled": true })));
        assert_eq!(frame.options, Some(json!({ "headers": {} })));
        socket.respond_success(frame.id, json!(null)).await;

        assert_eq!(call.await.unwrap(), Ok(json!(null)));
    }

    #[tokio::test]
    async fn test_remote_failure_rejects_with_payload_verbatim() {
        let (dispatcher, mut socket) = connected().await;

        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("start_mining", None, None).await }
        });

        let frame = socket.next_command().await;
        socket
            .respond_error(frame.id, json!({ "kind": "NodeNotSynced", "height": 3 }))
            .await;

        assert_eq!(
            call.await.unwrap(),
            Err(BridgeError::Remote(json!({ "kind": "NodeNotSynced", "height": 3 })))
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_settle_with_their_own_response() {
        let (dispatcher, mut socket) = connected().await;
        const CALLS: usize = 8;

        let calls: Vec<_> = (0..CALLS)
            .map(|n| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher
                        .invoke("echo", Some(json!({ "n": n })), None)
                        .await
                })
            })
            .collect();

        let mut frames = Vec::new();
        for _ in 0..CALLS {
            frames.push(socket.next_command().await);
        }

        let mut ids: Vec<u64> = frames.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CALLS);

        // Answer in reverse order; correlation is by id, not by send order
        for frame in frames.iter().rev() {
            let n = frame.args.as_ref().unwrap()["n"].clone();
            socket.respond_success(frame.id, json!({ "n": n })).await;
        }

        let results = join_all(calls).await;
        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), Ok(json!({ "n": n })));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_command_and_cleans_up() {
        let (dispatcher, mut socket) = connected().await;

        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("slow_command", None, None).await }
        });
        let frame = socket.next_command().await;

        tokio::time::advance(TIMEOUT).await;

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            BridgeError::Timeout {
                command: "slow_command".to_string(),
                timeout_ms: 30_000,
            }
        );
        assert!(err.to_string().contains("slow_command"));
        assert_eq!(dispatcher.pending_count().await, 0);

        // A late response for the timed-out id is ignored
        socket.respond_success(frame.id, json!("late")).await;
        tokio::task::yield_now().await;
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_of_one_call_does_not_affect_another() {
        let (dispatcher, mut socket) = connected().await;

        let slow = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("slow_command", None, None).await }
        });
        socket.next_command().await;

        tokio::time::advance(Duration::from_secs(20)).await;

        let fast = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("get_network", None, None).await }
        });
        let fast_frame = socket.next_command().await;

        // Slow call expires while the fast one is still pending
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(
            slow.await.unwrap(),
            Err(BridgeError::Timeout { .. })
        ));

        socket.respond_success(fast_frame.id, json!("localnet")).await;
        assert_eq!(fast.await.unwrap(), Ok(json!("localnet")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_calls_leave_no_pending_entries() {
        let (dispatcher, mut socket) = connected().await;

        for _ in 0..5 {
            let abandoned = tokio::time::timeout(
                Duration::from_millis(10),
                dispatcher.invoke("get_network", None, None),
            )
            .await;
            assert!(abandoned.is_err());
        }
        for _ in 0..5 {
            socket.next_command().await;
        }
        assert_eq!(dispatcher.pending_count().await, 0);

        // Aborting the calling task cleans up the same way
        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.invoke("get_network", None, None).await }
        });
        let frame = socket.next_command().await;
        assert_eq!(dispatcher.pending_count().await, 1);
        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());
        assert_eq!(dispatcher.pending_count().await, 0);

        // A response for an abandoned id is dropped
        socket.respond_success(frame.id, json!("localnet")).await;
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let (dispatcher, mut socket) = connected().await;

        for expected in 1..=3u64 {
            let call = tokio::spawn({
                let dispatcher = dispatcher.clone();
                async move { dispatcher.invoke("get_network", None, None).await }
            });
            let frame = socket.next_command().await;
            assert_eq!(frame.id, expected);
            socket.respond_success(frame.id, json!("localnet")).await;
            call.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_no_transport_when_connect_fails() {
        let (connector, _harness) = ChannelConnector::refusing();
        let dispatcher = dispatcher(connector);

        let err = dispatcher.invoke("get_network", None, None).await.unwrap_err();

        assert_eq!(err, BridgeError::NoTransport);
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_native_bridge_bypasses_socket() {
        let (connector, _harness) = ChannelConnector::new();

        let mut native = MockNativeBridge::new();
        native
            .expect_invoke()
            .times(1)
            .returning(|command, args, _options| {
                assert_eq!(command, "get_network");
                assert!(args.is_none());
                Ok(json!("mainnet"))
            });
        let native: Arc<dyn NativeBridge> = Arc::new(native);

        let mut host = MockHostEnvironment::new();
        host.expect_native_bridge()
            .returning(move || Some(Arc::clone(&native)));
        let host: Arc<dyn HostEnvironment> = Arc::new(host);

        let transport = Transport::new(
            "ws://test",
            Duration::from_millis(2_000),
            Arc::clone(&host),
            connector.clone(),
        );
        let dispatcher = CommandDispatcher::new(host, transport, TIMEOUT);

        let result = dispatcher.invoke("get_network", None, None).await;

        assert_eq!(result, Ok(json!("mainnet")));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_native_errors_pass_through_unchanged() {
        let mut native = MockNativeBridge::new();
        native
            .expect_invoke()
            .returning(|_, _, _| Err(BridgeError::Remote(json!("Wallet not initialized"))));
        let native: Arc<dyn NativeBridge> = Arc::new(native);

        let mut host = MockHostEnvironment::new();
        host.expect_native_bridge()
            .returning(move || Some(Arc::clone(&native)));
        let host: Arc<dyn HostEnvironment> = Arc::new(host);

        let (connector, _harness) = ChannelConnector::new();
        let transport = Transport::new("ws://test", Duration::ZERO, Arc::clone(&host), connector);
        let dispatcher = CommandDispatcher::new(host, transport, TIMEOUT);

        assert_eq!(
            dispatcher.invoke("get_balance", None, None).await,
            Err(BridgeError::Remote(json!("Wallet not initialized")))
        );
    }
}
