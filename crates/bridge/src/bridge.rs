//! UiBridge - the invoke/listen surface exposed to application code.
//!
//! One instance owns the transport and shares it between the command
//! dispatcher and the event subscriber. Build it once and pass it by reference
//! (or clone it; clones share everything).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use remote_ui_protocol::EventFrame;

use crate::config::{BridgeConfig, ConfigError};
use crate::error::BridgeError;
use crate::infrastructure::harness_ready;
use crate::infrastructure::host::ShimOnlyHost;
use crate::infrastructure::messaging::{CommandDispatcher, EventSubscriber, ListenOptions, Unlisten};
use crate::infrastructure::websocket::{ConnectionState, Connector, Transport, WebSocketConnector};
use crate::ports::outbound::HostEnvironment;

/// Bridge between application code and the harness (or a native bridge).
#[derive(Clone)]
pub struct UiBridge {
    config: BridgeConfig,
    host: Arc<dyn HostEnvironment>,
    transport: Transport,
    dispatcher: CommandDispatcher,
    subscriber: EventSubscriber,
}

impl UiBridge {
    pub fn new(
        config: BridgeConfig,
        host: Arc<dyn HostEnvironment>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let transport = Transport::new(
            config.ws_url.clone(),
            config.retry_cooldown,
            Arc::clone(&host),
            connector,
        );
        let dispatcher =
            CommandDispatcher::new(Arc::clone(&host), transport.clone(), config.invoke_timeout);
        let subscriber = EventSubscriber::new(Arc::clone(&host), transport.clone());

        Self {
            config,
            host,
            transport,
            dispatcher,
            subscriber,
        }
    }

    /// Browser-only bridge: no native bridge, real WebSocket transport.
    pub fn shim(config: BridgeConfig) -> Self {
        Self::new(config, Arc::new(ShimOnlyHost), Arc::new(WebSocketConnector))
    }

    /// Shim bridge configured from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::shim(BridgeConfig::from_env()?))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Invoke a command and await its result.
    pub async fn invoke(
        &self,
        command: &str,
        args: Option<Value>,
        options: Option<Value>,
    ) -> Result<Value, BridgeError> {
        self.dispatcher.invoke(command, args, options).await
    }

    /// Listen for an event; the handler receives the full event frame.
    pub async fn listen<F>(
        &self,
        event: &str,
        handler: F,
        options: Option<ListenOptions>,
    ) -> Result<Unlisten, BridgeError>
    where
        F: Fn(EventFrame) + Send + Sync + 'static,
    {
        self.subscriber.listen(event, handler, options).await
    }

    /// Listen for the next occurrence of an event only.
    pub async fn once<F>(
        &self,
        event: &str,
        handler: F,
        options: Option<ListenOptions>,
    ) -> Result<Unlisten, BridgeError>
    where
        F: FnOnce(EventFrame) + Send + 'static,
    {
        self.subscriber.once(event, handler, options).await
    }

    /// Emit an application event. The shim has no upstream channel for these,
    /// so the call is only logged.
    pub fn emit(&self, event: &str, payload: Option<Value>) {
        tracing::info!(
            event,
            payload = ?payload,
            native = self.host.native_bridge().is_some(),
            "emit (not forwarded)"
        );
    }

    /// Emit an application event to a target. Logged only, like [`Self::emit`].
    pub fn emit_to(&self, target: &str, event: &str, payload: Option<Value>) {
        tracing::info!(
            target_label = target,
            event,
            payload = ?payload,
            native = self.host.native_bridge().is_some(),
            "emit_to (not forwarded)"
        );
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.transport.state().await
    }

    /// Block until the harness info endpoint answers, or fail after `timeout`.
    pub async fn wait_for_harness(&self, timeout: Duration) -> Result<(), BridgeError> {
        harness_ready::wait_for_harness(&self.config.info_url, timeout).await
    }
}
