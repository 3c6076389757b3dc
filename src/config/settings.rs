use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use super::{AppConfig, ConfigError};

type Getter = fn(&AppConfig) -> String;
type Setter = fn(&mut AppConfig, &str) -> Result<(), ConfigError>;

/// Named, typed accessor for one settings field
struct Setting {
    name: &'static str,
    get: Getter,
    set: Setter,
}

/// Every setting that can be changed by name, in display order
static SETTINGS: &[Setting] = &[
    Setting {
        name: "java_path",
        get: |c| c.server.java_path.clone(),
        set: |c, v| {
            c.server.java_path = v.to_string();
            Ok(())
        },
    },
    Setting {
        name: "directory",
        get: |c| c.server.directory.display().to_string(),
        set: |c, v| {
            c.server.directory = PathBuf::from(v);
            Ok(())
        },
    },
    Setting {
        name: "max_ram",
        get: |c| c.server.max_ram.clone(),
        set: |c, v| {
            c.server.max_ram = v.to_string();
            Ok(())
        },
    },
    Setting {
        name: "min_ram",
        get: |c| c.server.min_ram.clone(),
        set: |c, v| {
            c.server.min_ram = v.to_string();
            Ok(())
        },
    },
    Setting {
        name: "jar",
        get: |c| c.server.jar.clone(),
        set: |c, v| {
            c.server.jar = v.to_string();
            Ok(())
        },
    },
    Setting {
        name: "extra_args",
        get: |c| c.server.extra_args.clone(),
        set: |c, v| {
            c.server.extra_args = v.to_string();
            Ok(())
        },
    },
    Setting {
        name: "port",
        get: |c| c.web.port.to_string(),
        set: |c, v| {
            c.web.port = v.trim().parse().map_err(|err: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    setting: "port".into(),
                    reason: err.to_string(),
                }
            })?;
            Ok(())
        },
    },
];

/// One row of the settings listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingEntry {
    pub name: &'static str,
    pub value: String,
}

/// Shared, file-backed application settings
#[derive(Debug, Clone)]
pub struct SettingsStore {
    config: Arc<RwLock<AppConfig>>,
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(config: AppConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path: path.into(),
        }
    }

    /// Path the settings are persisted to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// List every setting with its current value
    pub fn entries(&self) -> Vec<SettingEntry> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        SETTINGS
            .iter()
            .map(|setting| SettingEntry {
                name: setting.name,
                value: (setting.get)(&config),
            })
            .collect()
    }

    /// Set one setting by name and persist the file
    ///
    /// The in-memory value is only replaced once the file write succeeds.
    pub fn set(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let setting = SETTINGS
            .iter()
            .find(|setting| setting.name == name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = config.clone();
        (setting.set)(&mut updated, value)?;
        updated.save(&self.path)?;
        *config = updated;

        tracing::info!(setting = name, value, "setting updated");
        Ok(())
    }
}
