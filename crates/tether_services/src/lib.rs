//! Tether Services Layer
//!
//! Host-level services: settings loading and validation.

pub mod settings;

pub use settings::{LoggingSettings, Settings, SettingsError};
