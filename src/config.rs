//! Application configuration
//!
//! A single TOML file under the platform config directory
//! (`~/.config/gattbridge/config.toml` on Linux). Missing files are created
//! with defaults, missing keys fall back to their defaults so older files
//! keep loading after new settings are added.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::mqtt::config::MqttSettings;

const CONFIG_DIR: &str = "gattbridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Neither a config nor a home directory could be determined")]
    NoConfigDir,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ble: BleSettings,
    pub mqtt: MqttSettings,
    pub ui: UiSettings,
}

/// Which peripheral to connect to and how long to look for it.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BleSettings {
    /// Case-insensitive substring of the local name, or an exact address.
    /// `None` picks the first peripheral advertising a name.
    pub device_filter: Option<String>,
    pub scan_secs: u64,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            device_filter: None,
            scan_secs: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub fps: u8,
    pub dark_theme: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            dark_theme: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config dir>/gattbridge/config.toml`, falling back to the home directory
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Loads the config at `path`, writing the defaults first if it does not exist.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Creating default configuration at {}", path.display());
            let config = AppConfig::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, self.to_toml_string()?)
            .await
            .map_err(io_err)
    }
}
