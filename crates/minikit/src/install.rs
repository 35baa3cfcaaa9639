//! One-time handshake with the host app.
//!
//! `Uninstalled -> Installing -> Ready`, or `Failed` when the `init` exchange
//! does not succeed. The installation marker is published on entering
//! `Installing` and stays set until [`MiniKit::cleanup`], so a failed install
//! cannot be retried in place.

use shared::{
    domain::{CommandId, EventName, SafeAreaInsets},
    error::{InstallError, InstallErrorCode},
    protocol::{HostMarker, InitCommandPayload, InitResponse, OutboundMessage},
};
use tracing::{error, info, warn};

use crate::{
    error::{CommandError, TriggerError},
    MiniKit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallPhase {
    #[default]
    Uninstalled,
    Installing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub did: Option<String>,
    pub web3_name: Option<String>,
    pub wallet_address: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub opted_into_optional_analytics: bool,
}

impl Identity {
    fn from_host(host: &HostMarker) -> Self {
        Self {
            opted_into_optional_analytics: host.is_optional_analytics.unwrap_or(false),
            ..Self::default()
        }
    }

    fn apply_init(&mut self, init: &InitResponse) {
        self.did = init.did.clone();
        self.web3_name = init.web3_name.clone();
        self.wallet_address = init.wallet_address.clone().or_else(|| init.did.clone());
        self.email = init.email.clone();
        self.name = init.name.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceProperties {
    pub safe_area_insets: SafeAreaInsets,
    pub device_os: String,
    pub host_app_version: u32,
}

impl DeviceProperties {
    fn from_host(host: &HostMarker) -> Self {
        Self {
            safe_area_insets: host.safe_area_insets.unwrap_or_default(),
            device_os: host
                .device_os
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            host_app_version: host.version.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstallationState {
    pub phase: InstallPhase,
    pub app_id: Option<String>,
    pub identity: Identity,
    pub device: DeviceProperties,
    pub supported_commands: Vec<String>,
}

impl InstallationState {
    pub fn is_ready(&self) -> bool {
        self.phase == InstallPhase::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    Installed { init: InitResponse },
    Failed(InstallError),
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }

    pub fn error(&self) -> Option<&InstallError> {
        match self {
            Self::Installed { .. } => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<InstallErrorCode> for InstallResult {
    fn from(code: InstallErrorCode) -> Self {
        Self::Failed(code.into())
    }
}

fn normalize_app_id(app_id: &str) -> Option<String> {
    let trimmed = app_id.trim();
    if trimmed.is_empty() {
        warn!("Invalid app ID provided during install");
        return None;
    }
    Some(trimmed.to_string())
}

impl MiniKit {
    /// Runs the handshake. Failures are returned as [`InstallResult::Failed`],
    /// never raised.
    pub async fn install(&self, app_id: &str) -> InstallResult {
        let Some(scope) = self.environment.scope() else {
            error!("install: no global execution context");
            return InstallErrorCode::NotOnClient.into();
        };
        if scope.is_minikit_installed() {
            return InstallErrorCode::AlreadyInstalled.into();
        }
        let Some(host) = scope.host() else {
            return InstallErrorCode::OutsideHost.into();
        };
        let min_version = self.settings.min_host_version;
        if min_version > 0 && host.version.unwrap_or(0) < min_version {
            warn!(
                host_version = host.version.unwrap_or(0),
                min_version, "install: host app is out of date"
            );
            return InstallErrorCode::AppOutOfDate.into();
        }
        if !scope.publish_marker() {
            return InstallErrorCode::AlreadyInstalled.into();
        }

        let app_id = normalize_app_id(app_id);
        {
            let mut state = self.write_state();
            state.phase = InstallPhase::Installing;
            state.app_id = app_id.clone();
            state.identity = Identity::from_host(host);
            state.device = DeviceProperties::from_host(host);
            state.supported_commands = host.supported_commands.clone().unwrap_or_default();
        }

        let init = match self.send_init(app_id.unwrap_or_default()).await {
            Ok(init) => init,
            Err(CommandError::Cancelled { .. }) => {
                info!("install: init cancelled by cleanup");
                return InstallErrorCode::Unknown.into();
            }
            Err(err) => {
                error!("install: init exchange failed: {err}");
                self.notifier.notify(&err.to_string());
                self.mark_failed();
                return InstallErrorCode::Unknown.into();
            }
        };

        if !init.is_success() {
            error!(status = %init.status, message = ?init.message, "Init failed");
            self.mark_failed();
            return InstallResult::Failed(InstallError::new(
                InstallErrorCode::Unknown,
                format!("MiniKit initialization failed with status: {}", init.status),
            ));
        }

        {
            let mut state = self.write_state();
            if state.phase != InstallPhase::Installing {
                return InstallErrorCode::Unknown.into();
            }
            state.identity.apply_init(&init);
            state.phase = InstallPhase::Ready;
        }
        info!(app_id = ?self.app_id(), did = ?init.did, "minikit installed");
        InstallResult::Installed { init }
    }

    /// A reset that raced the handshake wins over its failure.
    fn mark_failed(&self) {
        let mut state = self.write_state();
        if state.phase == InstallPhase::Installing {
            state.phase = InstallPhase::Failed;
        }
    }

    async fn send_init(&self, appid: String) -> Result<InitResponse, CommandError> {
        let response = self
            .correlator
            .await_command(EventName::Init, CommandId::Init, |correlation_id| {
                let message = OutboundMessage {
                    command: CommandId::Init,
                    payload: InitCommandPayload::new(appid),
                    correlation_id,
                };
                self.transport.send(&message).map_err(TriggerError::from)?;
                Ok(message.payload)
            })
            .await?;
        Ok(response.decode::<InitResponse>(EventName::Init)?.final_payload)
    }

    /// Whether the handshake completed. Logs when it has not.
    pub fn is_installed(&self) -> bool {
        if self.environment.scope().is_none() {
            error!("MiniKit unavailable: no global execution context");
            return false;
        }
        let ready = self.read_state().is_ready();
        if !ready {
            error!("MiniKit is not installed. Make sure you're running inside Sporran App");
        }
        ready
    }

    /// Whether the host advertised `command`. An empty list means the host did
    /// not say, which is treated as supported.
    pub fn supports(&self, command: CommandId) -> bool {
        let state = self.read_state();
        state.supported_commands.is_empty()
            || state
                .supported_commands
                .iter()
                .any(|supported| supported == command.as_str())
    }
}

#[cfg(test)]
#[path = "tests/install_tests.rs"]
mod tests;
