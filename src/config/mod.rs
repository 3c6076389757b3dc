//! Application settings stored in a TOML file.

mod settings;

pub use settings::{SettingEntry, SettingsStore};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "mcpanel.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid setting name: {0}")]
    UnknownSetting(String),
    #[error("invalid value for {setting}: {reason}")]
    InvalidValue { setting: String, reason: String },
}

/// Launch parameters of the game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Java executable
    pub java_path: String,
    /// Working directory of the server, also holds server.properties
    pub directory: PathBuf,
    pub max_ram: String,
    pub min_ram: String,
    /// Server archive, relative to `directory`
    pub jar: String,
    /// Extra arguments appended after the jar, split on whitespace
    pub extra_args: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            java_path: "java".into(),
            directory: PathBuf::from("."),
            max_ram: "2G".into(),
            min_ram: "1G".into(),
            jar: "server.jar".into(),
            extra_args: "nogui".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { port: 8082 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub web: WebConfig,
}

impl AppConfig {
    /// Load from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, writing the defaults first if the file does not exist
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        tracing::info!(path = %path.display(), "created default config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
