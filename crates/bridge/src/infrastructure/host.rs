//! Host environment adapters.
//!
//! `HostGlobals` models the host's global scope: a native bridge may be installed
//! under either of two well-known names. `ShimOnlyHost` is a browser-only host
//! with no native bridge at all.

use std::sync::Arc;

use dashmap::DashMap;

use crate::ports::outbound::{HostEnvironment, NativeBridge};

/// Global names checked for a native bridge, in order.
pub const NATIVE_BRIDGE_GLOBALS: [&str; 2] = ["__TAURI_INTERNALS__", "__TAURI__"];

/// Host whose globals may carry a native bridge.
#[derive(Clone, Default)]
pub struct HostGlobals {
    globals: Arc<DashMap<String, Arc<dyn NativeBridge>>>,
}

impl HostGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a bridge under a global name.
    pub fn install(&self, name: impl Into<String>, bridge: Arc<dyn NativeBridge>) {
        let name = name.into();
        tracing::debug!(global = %name, "Native bridge installed");
        self.globals.insert(name, bridge);
    }

    /// Remove a global. Returns true if something was installed under `name`.
    pub fn remove(&self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }
}

impl HostEnvironment for HostGlobals {
    fn native_bridge(&self) -> Option<Arc<dyn NativeBridge>> {
        NATIVE_BRIDGE_GLOBALS
            .iter()
            .find_map(|name| self.globals.get(*name).map(|entry| Arc::clone(entry.value())))
    }
}

/// Host without a native bridge; every call goes through the socket shim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShimOnlyHost;

impl HostEnvironment for ShimOnlyHost {
    fn native_bridge(&self) -> Option<Arc<dyn NativeBridge>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::MockNativeBridge;

    #[test]
    fn test_empty_globals_have_no_bridge() {
        assert!(HostGlobals::new().native_bridge().is_none());
        assert!(ShimOnlyHost.native_bridge().is_none());
    }

    #[test]
    fn test_bridge_found_under_either_name() {
        for name in NATIVE_BRIDGE_GLOBALS {
            let host = HostGlobals::new();
            host.install(name, Arc::new(MockNativeBridge::new()));
            assert!(host.native_bridge().is_some(), "not found under {}", name);
        }
    }

    #[test]
    fn test_unrelated_global_is_ignored() {
        let host = HostGlobals::new();
        host.install("__ELECTRON__", Arc::new(MockNativeBridge::new()));
        assert!(host.native_bridge().is_none());
    }

    #[test]
    fn test_removed_bridge_is_no_longer_found() {
        let host = HostGlobals::new();
        host.install("__TAURI__", Arc::new(MockNativeBridge::new()));
        assert!(host.remove("__TAURI__"));
        assert!(host.native_bridge().is_none());
    }
}
