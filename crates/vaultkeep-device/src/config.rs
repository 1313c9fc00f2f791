//! Device configuration.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. `$VAULTKEEP_DEVICE_CONFIG` (explicit override)
//!   2. `$XDG_CONFIG_HOME/vaultkeep-device/config.toml`
//!   3. `~/.config/vaultkeep-device/config.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identifier this device was provisioned under.
    pub device_id: u32,
    /// Collector host to connect to.
    pub collector_host: String,
    /// Collector TCP port.
    pub collector_port: u16,
    /// Base directory holding `dvVaults/` and `dvKeys/`.
    pub vault_dir: PathBuf,
    /// Delay before a reconnect attempt after the connection drops.
    pub reconnect_backoff_secs: u64,
    /// Delay between telemetry records once a session is live.
    pub sample_interval_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: 1058,
            collector_host: "localhost".to_string(),
            collector_port: 9096,
            vault_dir: data_dir(),
            reconnect_backoff_secs: 3,
            sample_interval_secs: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

impl DeviceConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            DeviceConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("VAULTKEEP_DEVICE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VAULTKEEP_DEVICE_ID") {
            if let Ok(id) = v.parse() {
                self.device_id = id;
            }
        }
        if let Ok(v) = std::env::var("VAULTKEEP_COLLECTOR_HOST") {
            self.collector_host = v;
        }
        if let Ok(v) = std::env::var("VAULTKEEP_COLLECTOR_PORT") {
            if let Ok(p) = v.parse() {
                self.collector_port = p;
            }
        }
        if let Ok(v) = std::env::var("VAULTKEEP_VAULT_DIR") {
            self.vault_dir = PathBuf::from(v);
        }
    }
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vaultkeep-device")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("vaultkeep-device")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/tmp"))
}
