//! Bridge configuration.
//!
//! Defaults match the test-harness endpoint; every value can be overridden
//! through `REMOTE_UI_*` environment variables (optionally loaded from
//! `.env.local` / `.env` via [`load_dotenv`]).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use remote_ui_protocol::{DEFAULT_HARNESS_PORT, REMOTE_UI_INFO_PATH, REMOTE_UI_WS_PATH};

pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_COOLDOWN_MS: u64 = 2_000;

pub const ENV_WS_URL: &str = "REMOTE_UI_WS_URL";
pub const ENV_INFO_URL: &str = "REMOTE_UI_INFO_URL";
pub const ENV_INVOKE_TIMEOUT_MS: &str = "REMOTE_UI_INVOKE_TIMEOUT_MS";
pub const ENV_RETRY_COOLDOWN_MS: &str = "REMOTE_UI_RETRY_COOLDOWN_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid URL `{value}`: {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: expected a number of milliseconds, got `{value}`")]
    InvalidMillis { var: &'static str, value: String },
}

/// Connection settings for the socket bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the harness
    pub ws_url: String,
    /// HTTP endpoint polled while waiting for the harness
    pub info_url: String,
    /// Hard per-command timeout, counted from send time
    pub invoke_timeout: Duration,
    /// Minimum interval between connection attempts
    pub retry_cooldown: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_HARNESS_PORT));
        Self::for_harness(addr)
    }
}

impl BridgeConfig {
    /// Configuration for a harness listening on `addr`, with default timings.
    pub fn for_harness(addr: SocketAddr) -> Self {
        Self {
            ws_url: format!("ws://{}{}", addr, REMOTE_UI_WS_PATH),
            info_url: format!("http://{}{}", addr, REMOTE_UI_INFO_PATH),
            invoke_timeout: Duration::from_millis(DEFAULT_INVOKE_TIMEOUT_MS),
            retry_cooldown: Duration::from_millis(DEFAULT_RETRY_COOLDOWN_MS),
        }
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    pub fn with_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.retry_cooldown = cooldown;
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = non_empty(lookup(ENV_WS_URL)) {
            config.ws_url = parse_url(ENV_WS_URL, &value, &["ws", "wss"])?;
        }
        if let Some(value) = non_empty(lookup(ENV_INFO_URL)) {
            config.info_url = parse_url(ENV_INFO_URL, &value, &["http", "https"])?;
        }
        if let Some(value) = non_empty(lookup(ENV_INVOKE_TIMEOUT_MS)) {
            config.invoke_timeout = parse_millis(ENV_INVOKE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_RETRY_COOLDOWN_MS)) {
            config.retry_cooldown = parse_millis(ENV_RETRY_COOLDOWN_MS, &value)?;
        }

        Ok(config)
    }
}

/// Load `.env.local` then `.env` from `dir`, without overriding variables that
/// are already set.
pub fn load_dotenv(dir: &Path) {
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        if path.exists() {
            if let Err(e) = dotenvy::from_path(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load env file");
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_url(var: &'static str, value: &str, schemes: &[&str]) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            var,
            value: value.to_string(),
            reason: format!("scheme must be one of {:?}", schemes),
        });
    }

    Ok(url.to_string())
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis {
            var,
            value: value.to_string(),
        })
}
