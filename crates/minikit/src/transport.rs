use std::sync::Arc;

use serde::Serialize;
use shared::protocol::OutboundMessage;
use tracing::{debug, error};

use crate::{error::TransportError, notify::Notifier, platform::BridgeKind};

/// One-way channel into the host app. Delivery is fire-and-forget.
pub trait Transport: Send + Sync {
    fn send(&self, bytes: &[u8]) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SelectedBridge {
    pub kind: BridgeKind,
    pub transport: Arc<dyn Transport>,
}

/// Serializes outbound commands and hands them to the detected bridge.
pub struct TransportSender {
    bridge: Option<SelectedBridge>,
    notifier: Arc<dyn Notifier>,
}

impl TransportSender {
    pub fn new(bridge: Option<SelectedBridge>, notifier: Arc<dyn Notifier>) -> Self {
        Self { bridge, notifier }
    }

    pub fn bridge_kind(&self) -> Option<BridgeKind> {
        self.bridge.as_ref().map(|bridge| bridge.kind)
    }

    pub fn send<T: Serialize>(&self, message: &OutboundMessage<T>) -> Result<(), TransportError> {
        let Some(bridge) = &self.bridge else {
            error!(command = %message.command, "transport: no supported host bridge");
            self.notifier.notify("No supported environment found.");
            return Err(TransportError::Unsupported);
        };

        let bytes = serde_json::to_vec(message).map_err(|source| TransportError::Serialize {
            command: message.command,
            source,
        })?;
        bridge
            .transport
            .send(&bytes)
            .map_err(|source| TransportError::Bridge {
                command: message.command,
                source,
            })?;

        debug!(
            command = %message.command,
            bridge = ?bridge.kind,
            bytes = bytes.len(),
            "transport: command posted"
        );
        Ok(())
    }
}
