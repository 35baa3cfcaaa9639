//! Command bridge between a mini-app and the wallet app hosting it.
//!
//! The host exposes a one-way `postMessage`-style channel and calls back into
//! the mini-app with `(event, payload)` pairs. [`MiniKit`] turns that into
//! awaited commands: it performs the `init` handshake, then issues commands
//! such as `pay` and resolves them when the host answers.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use shared::{domain::EventName, protocol::InboundMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod commands;
pub mod config;
pub mod correlator;
pub mod error;
pub mod install;
pub mod notify;
pub mod platform;
pub mod registry;
pub mod transport;
pub mod validation;

pub use commands::PayResponse;
pub use config::{load_settings, MiniKitSettings};
pub use correlator::{CorrelatedResponse, CorrelationMode, Correlator};
pub use error::{CommandError, RegistryError, TransportError, TriggerError, ValidationError};
pub use install::{DeviceProperties, Identity, InstallPhase, InstallResult, InstallationState};
pub use notify::{Notifier, TracingNotifier};
pub use platform::{BridgeKind, GlobalScope, HostEnvironment};
pub use registry::{DispatchOutcome, EventRegistry, SubscriptionId};
pub use transport::{Transport, TransportSender};

/// One mini-app's connection to its host.
///
/// Owns the installation state, the event registry and the correlator. Share
/// it as `Arc<MiniKit>`; the host callback path only needs `&self`.
pub struct MiniKit {
    environment: HostEnvironment,
    settings: MiniKitSettings,
    registry: Arc<EventRegistry>,
    correlator: Correlator,
    transport: TransportSender,
    notifier: Arc<dyn Notifier>,
    state: RwLock<InstallationState>,
}

impl MiniKit {
    pub fn new(environment: HostEnvironment, settings: MiniKitSettings) -> Arc<Self> {
        Self::new_with_notifier(environment, settings, Arc::new(TracingNotifier))
    }

    pub fn new_with_notifier(
        environment: HostEnvironment,
        settings: MiniKitSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let registry = Arc::new(EventRegistry::new());
        let correlator = Correlator::new(
            Arc::clone(&registry),
            settings.correlation_mode,
            settings.command_timeout,
        );
        let bridge = environment.select_bridge();
        if let Some(bridge) = &bridge {
            debug!(bridge = ?bridge.kind, "minikit: host bridge selected");
        }
        let transport = TransportSender::new(bridge, Arc::clone(&notifier));

        Arc::new(Self {
            environment,
            settings,
            registry,
            correlator,
            transport,
            notifier,
            state: RwLock::new(InstallationState::default()),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, InstallationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, InstallationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &MiniKitSettings {
        &self.settings
    }

    pub fn state(&self) -> InstallationState {
        self.read_state().clone()
    }

    pub fn phase(&self) -> InstallPhase {
        self.read_state().phase
    }

    pub fn app_id(&self) -> Option<String> {
        self.read_state().app_id.clone()
    }

    pub fn identity(&self) -> Identity {
        self.read_state().identity.clone()
    }

    pub fn device_properties(&self) -> DeviceProperties {
        self.read_state().device.clone()
    }

    pub fn bridge_kind(&self) -> Option<BridgeKind> {
        self.transport.bridge_kind()
    }

    pub fn subscribe<F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.subscribe(event, handler)
    }

    pub fn subscribe_channel(
        &self,
        event: EventName,
        tx: mpsc::UnboundedSender<Value>,
    ) -> Result<SubscriptionId, RegistryError> {
        self.registry.subscribe_channel(event, tx)
    }

    pub fn unsubscribe(&self, event: EventName) -> bool {
        self.registry.unsubscribe(event)
    }

    /// Entry point for host callbacks that arrive already decoded.
    pub fn dispatch(&self, event: EventName, payload: &Value) -> DispatchOutcome {
        self.registry.dispatch(event, payload)
    }

    /// Entry point for raw host callbacks: `{"event": ..., "payload": ...}`.
    /// Undecodable messages and unknown event names are logged and dropped.
    pub fn receive(&self, bytes: &[u8]) -> Option<DispatchOutcome> {
        let message: InboundMessage = match serde_json::from_slice(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!("minikit: dropping malformed host message: {err}");
                return None;
            }
        };
        let Some(event) = EventName::parse(&message.event) else {
            warn!(event = %message.event, "minikit: dropping message for unknown event");
            return None;
        };
        Some(self.dispatch(event, &message.payload))
    }

    /// Resets installation state, fails pending commands, clears every
    /// handler and removes the installation marker.
    pub fn cleanup(&self) {
        self.correlator.cancel_all();
        self.registry.clear();
        *self.write_state() = InstallationState::default();
        if let Some(scope) = self.environment.scope() {
            scope.clear_marker();
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
