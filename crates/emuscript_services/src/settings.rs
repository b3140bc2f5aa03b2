//! Settings management

use emuscript_core::BridgeSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bridge: BridgeSettings,
    pub emulator: HeadlessSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessSettings {
    /// Bytes of RAM backing each memory kind.
    pub ram_size: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Number of ports with a standard controller plugged into subport 0.
    pub controller_ports: u8,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            ram_size: 0x10000,
            frame_width: 256,
            frame_height: 240,
            controller_ports: 2,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuscript_core::RuntimeMode;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "bridge": { "runtime_mode": "shared", "log_capacity": 50 } }"#)
                .unwrap();
        assert_eq!(settings.bridge.runtime_mode, RuntimeMode::Shared);
        assert_eq!(settings.bridge.log_capacity, 50);
        assert_eq!(settings.bridge.memory_limit, None);
        assert_eq!(settings.emulator, HeadlessSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("emuscript-settings-{}.json", std::process::id()));
        let mut settings = Settings::default();
        settings.emulator.controller_ports = 4;
        settings.bridge.memory_limit = Some(16 * 1024 * 1024);

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = serde_json::from_str::<Settings>("{ not json").unwrap_err();
        assert!(!SettingsError::from(err).to_string().is_empty());
    }
}
