//! Tether Services Layer
//!
//! Configuration for the engine and the runner.

pub mod settings;

pub use settings::{LoggingSettings, ScriptSettings, Settings, SettingsError};
