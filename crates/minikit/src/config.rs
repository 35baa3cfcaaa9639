use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::correlator::{CorrelationMode, DEFAULT_COMMAND_TIMEOUT};

pub const SETTINGS_FILE: &str = "minikit.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct MiniKitSettings {
    pub app_id: Option<String>,
    pub command_timeout: Duration,
    pub correlation_mode: CorrelationMode,
    /// Oldest host app version accepted at install; 0 disables the check.
    pub min_host_version: u32,
}

impl Default for MiniKitSettings {
    fn default() -> Self {
        Self {
            app_id: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            correlation_mode: CorrelationMode::default(),
            min_host_version: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    app_id: Option<String>,
    command_timeout_ms: Option<u64>,
    correlation_mode: Option<String>,
    min_host_version: Option<u32>,
}

pub fn load_settings() -> MiniKitSettings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> MiniKitSettings {
    let mut settings = MiniKitSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut MiniKitSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.app_id {
        settings.app_id = Some(v);
    }
    if let Some(v) = file_cfg.command_timeout_ms {
        settings.command_timeout = Duration::from_millis(v);
    }
    if let Some(mode) = file_cfg
        .correlation_mode
        .as_deref()
        .and_then(|raw| parse_mode("correlation_mode", raw))
    {
        settings.correlation_mode = mode;
    }
    if let Some(v) = file_cfg.min_host_version {
        settings.min_host_version = v;
    }
}

fn parse_mode(key: &str, raw: &str) -> Option<CorrelationMode> {
    let mode = CorrelationMode::parse(raw);
    if mode.is_none() {
        warn!(key, value = %raw, "ignoring unknown correlation mode");
    }
    mode
}

fn apply_env(settings: &mut MiniKitSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("MINIKIT_APP_ID") {
        settings.app_id = Some(v);
    }

    if let Some(v) = lookup("MINIKIT_COMMAND_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.command_timeout = Duration::from_millis(parsed);
        }
    }

    if let Some(mode) = lookup("MINIKIT_CORRELATION")
        .as_deref()
        .and_then(|raw| parse_mode("MINIKIT_CORRELATION", raw))
    {
        settings.correlation_mode = mode;
    }

    if let Some(v) = lookup("MINIKIT_MIN_HOST_VERSION") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.min_host_version = parsed;
        }
    }
}
