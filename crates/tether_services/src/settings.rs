//! Settings management

use serde::{Deserialize, Serialize};
use std::path::Path;
use tether_core::{RegistryConfig, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Host settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn max_level(&self) -> Result<tracing::Level, SettingsError> {
        self.level
            .parse()
            .map_err(|_| SettingsError::LogLevel(self.level.clone()))
    }
}

impl Settings {
    /// Parse and validate settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist. Malformed files are still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.logging.max_level()?;
        self.registry.validate()?;
        Ok(())
    }
}
