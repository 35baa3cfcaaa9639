//! What the host app exposes to the mini-app: its identity marker, the
//! message bridges it injected, and the shared installation marker.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::protocol::HostMarker;

use crate::transport::{SelectedBridge, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    /// Message channel of a native-app web view.
    NativeApp,
    /// iOS-style `messageHandlers` channel.
    IosMessageHandler,
    /// Android-style injected object.
    Android,
}

#[derive(Clone, Default)]
pub struct HostBridges {
    native_app: Option<Arc<dyn Transport>>,
    ios_message_handler: Option<Arc<dyn Transport>>,
    android: Option<Arc<dyn Transport>>,
}

impl HostBridges {
    pub fn with(mut self, kind: BridgeKind, transport: Arc<dyn Transport>) -> Self {
        let slot = match kind {
            BridgeKind::NativeApp => &mut self.native_app,
            BridgeKind::IosMessageHandler => &mut self.ios_message_handler,
            BridgeKind::Android => &mut self.android,
        };
        *slot = Some(transport);
        self
    }
}

/// Picks the bridge to use, by presence, in priority order.
pub fn detect(bridges: &HostBridges) -> Option<SelectedBridge> {
    [
        (BridgeKind::NativeApp, &bridges.native_app),
        (BridgeKind::IosMessageHandler, &bridges.ios_message_handler),
        (BridgeKind::Android, &bridges.android),
    ]
    .into_iter()
    .find_map(|(kind, transport)| {
        transport.as_ref().map(|transport| SelectedBridge {
            kind,
            transport: Arc::clone(transport),
        })
    })
}

/// The mini-app's global object. Clones share the installation marker.
#[derive(Clone, Default)]
pub struct GlobalScope {
    host: Option<HostMarker>,
    bridges: HostBridges,
    installed_marker: Arc<AtomicBool>,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: HostMarker) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_bridge(mut self, kind: BridgeKind, transport: Arc<dyn Transport>) -> Self {
        self.bridges = self.bridges.with(kind, transport);
        self
    }

    pub fn host(&self) -> Option<&HostMarker> {
        self.host.as_ref()
    }

    pub fn bridges(&self) -> &HostBridges {
        &self.bridges
    }

    pub fn is_minikit_installed(&self) -> bool {
        self.installed_marker.load(Ordering::SeqCst)
    }

    /// Sets the installation marker. Returns `false` if it was already set.
    pub fn publish_marker(&self) -> bool {
        self.installed_marker
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn clear_marker(&self) {
        self.installed_marker.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct HostEnvironment {
    scope: Option<GlobalScope>,
}

impl HostEnvironment {
    pub fn new(scope: GlobalScope) -> Self {
        Self { scope: Some(scope) }
    }

    /// No global execution context, so no bridge can exist.
    pub fn detached() -> Self {
        Self { scope: None }
    }

    pub fn scope(&self) -> Option<&GlobalScope> {
        self.scope.as_ref()
    }

    pub fn select_bridge(&self) -> Option<SelectedBridge> {
        self.scope().and_then(|scope| detect(scope.bridges()))
    }
}
