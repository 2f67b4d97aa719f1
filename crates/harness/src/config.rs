//! Harness configuration from the environment.

use std::net::SocketAddr;
use std::path::Path;

use remote_ui_protocol::DEFAULT_HARNESS_PORT;

use crate::error::HarnessError;

pub const ENV_HARNESS_ADDR: &str = "REMOTE_UI_HARNESS_ADDR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub addr: SocketAddr,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HARNESS_PORT)),
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENV_HARNESS_ADDR).filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                let addr = value
                    .trim()
                    .parse()
                    .map_err(|_| HarnessError::InvalidAddr {
                        var: ENV_HARNESS_ADDR,
                        value: value.clone(),
                    })?;
                Ok(Self { addr })
            }
            None => Ok(Self::default()),
        }
    }
}

/// Load `.env.local` and `.env` from the workspace root.
pub fn load_dotenv_from_repo_root() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
