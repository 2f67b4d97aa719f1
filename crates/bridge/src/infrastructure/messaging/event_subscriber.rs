//! Event Subscriber for push-only harness events.
//!
//! Listeners are registered on the open socket, keyed by event name. Each
//! registration is independent and is removed only through its own
//! [`Unlisten`] handle; unlistening sends nothing over the wire.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use dashmap::DashMap;

use remote_ui_protocol::EventFrame;

use crate::error::BridgeError;
use crate::infrastructure::websocket::Transport;
use crate::ports::outbound::HostEnvironment;

/// Callback invoked with the full event frame.
pub type EventHandler = Arc<dyn Fn(EventFrame) + Send + Sync>;

/// Identifier of one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    event: String,
    handler: EventHandler,
}

/// Listener registry of a single socket.
#[derive(Default)]
pub struct EventListeners {
    next_id: AtomicU64,
    listeners: DashMap<ListenerId, Listener>,
}

impl EventListeners {
    pub fn add<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(EventFrame) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(
            id,
            Listener {
                event: event.to_string(),
                handler: Arc::new(handler),
            },
        );
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver a frame to every listener registered for its name.
    ///
    /// Handlers are collected before any of them runs, so a handler may
    /// unlisten (itself or others) without deadlocking the registry.
    pub fn dispatch(&self, frame: &EventFrame) -> usize {
        let handlers: Vec<EventHandler> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().event == frame.name)
            .map(|entry| Arc::clone(&entry.value().handler))
            .collect();

        for handler in &handlers {
            handler(frame.clone());
        }
        handlers.len()
    }
}

/// Removes exactly one listener registration.
///
/// Holds the registry weakly: once the socket is gone there is nothing to remove.
#[derive(Clone)]
pub struct Unlisten {
    id: ListenerId,
    listeners: Weak<EventListeners>,
}

impl Unlisten {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns true if the listener was still registered.
    pub fn unlisten(&self) -> bool {
        self.listeners
            .upgrade()
            .map(|listeners| listeners.remove(self.id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlisten").field("id", &self.id).finish()
    }
}

/// Options accepted by `listen` for signature compatibility with the native bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Event target label; not used by the shim.
    pub target: Option<String>,
}

/// Registers event listeners on the shared socket.
#[derive(Clone)]
pub struct EventSubscriber {
    host: Arc<dyn HostEnvironment>,
    transport: Transport,
}

impl EventSubscriber {
    pub fn new(host: Arc<dyn HostEnvironment>, transport: Transport) -> Self {
        Self { host, transport }
    }

    /// Listen for `event` until the returned handle is used.
    pub async fn listen<F>(
        &self,
        event: &str,
        handler: F,
        options: Option<ListenOptions>,
    ) -> Result<Unlisten, BridgeError>
    where
        F: Fn(EventFrame) + Send + Sync + 'static,
    {
        if self.host.native_bridge().is_some() {
            tracing::error!(event, "listen called with a native bridge present");
            return Err(BridgeError::NativeListenUnsupported);
        }

        self.transport.ensure_connection().await;
        let Some(socket) = self.transport.wait_ready().await else {
            tracing::error!(event, url = %self.transport.url(), "No transport available for listen");
            return Err(BridgeError::NoTransport);
        };

        let listeners = socket.listeners();
        let id = listeners.add(event, handler);
        tracing::debug!(
            event,
            listener_id = id.0,
            target_label = options.as_ref().and_then(|o| o.target.as_deref()),
            "Listener registered"
        );

        Ok(Unlisten {
            id,
            listeners: Arc::downgrade(listeners),
        })
    }

    /// Listen for the first `event` only.
    ///
    /// The listener is removed before the handler runs.
    pub async fn once<F>(
        &self,
        event: &str,
        handler: F,
        options: Option<ListenOptions>,
    ) -> Result<Unlisten, BridgeError>
    where
        F: FnOnce(EventFrame) + Send + 'static,
    {
        let handler = Mutex::new(Some(handler));
        let fired = Arc::new(AtomicBool::new(false));
        let slot: Arc<OnceLock<Unlisten>> = Arc::new(OnceLock::new());

        let unlisten = self
            .listen(
                event,
                {
                    let fired = Arc::clone(&fired);
                    let slot = Arc::clone(&slot);
                    move |frame| {
                        if fired.swap(true, Ordering::SeqCst) {
                            return;
                        }
                        if let Some(unlisten) = slot.get() {
                            unlisten.unlisten();
                        }
                        let handler = handler.lock().ok().and_then(|mut h| h.take());
                        if let Some(handler) = handler {
                            handler(frame);
                        }
                    }
                },
                options,
            )
            .await?;

        let _ = slot.set(unlisten.clone());
        // Fired before the handle was stored; remove it now.
        if fired.load(Ordering::SeqCst) {
            unlisten.unlisten();
        }
        Ok(unlisten)
    }
}
