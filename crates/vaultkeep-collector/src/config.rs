//! Collector configuration.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. `$VAULTKEEP_COLLECTOR_CONFIG` (explicit override)
//!   2. `$XDG_CONFIG_HOME/vaultkeep-collector/config.toml`
//!   3. `~/.config/vaultkeep-collector/config.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Address to bind the device-facing TCP listener on.
    pub listen_host: String,
    /// TCP port to bind.
    pub listen_port: u16,
    /// Base directory holding `svVaults/` (raw per-device vaults).
    pub vault_dir: PathBuf,
    /// Path to the persistent telemetry database.
    pub db_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9096,
            vault_dir: data_dir(),
            db_path: data_dir().join("telemetry.sqlite3"),
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

impl CollectorConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            CollectorConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("VAULTKEEP_COLLECTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VAULTKEEP_LISTEN_HOST") {
            self.listen_host = v;
        }
        if let Ok(v) = std::env::var("VAULTKEEP_LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                self.listen_port = p;
            }
        }
        if let Ok(v) = std::env::var("VAULTKEEP_VAULT_DIR") {
            self.vault_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VAULTKEEP_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
    }
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vaultkeep-collector")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("vaultkeep-collector")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/tmp"))
}
