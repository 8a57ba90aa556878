//! Settings management

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Overrides `LoggingSettings::filter`.
pub const ENV_LOG: &str = "TETHER_LOG";
/// Extra module search paths, in the platform's path-list syntax.
pub const ENV_MODULE_PATH: &str = "TETHER_MODULE_PATH";
/// Overrides `ScriptSettings::memory_limit` (bytes).
pub const ENV_MEMORY_LIMIT: &str = "TETHER_MEMORY_LIMIT";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub script: ScriptSettings,
    pub logging: LoggingSettings,
}

/// Foreign runtime limits and bridge behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Heap limit for the script runtime in bytes. `None` means unlimited.
    pub memory_limit: Option<usize>,
    pub max_stack_size: Option<usize>,
    pub gc_threshold: Option<usize>,
    /// Directories searched when a module is imported by name.
    pub module_paths: Vec<PathBuf>,
    /// Maximum nesting followed when converting containers between runtimes.
    pub max_conversion_depth: usize,
    /// Report uncaught script exceptions as call errors. When disabled, a
    /// throwing call logs the exception and returns nil.
    pub exceptions_as_errors: bool,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_stack_size: None,
            gc_threshold: None,
            module_paths: Vec::new(),
            max_conversion_depth: 128,
            exceptions_as_errors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive string
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TETHER_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var_os(key));
    }

    /// Apply `TETHER_*` overrides from an arbitrary source.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        if let Some(filter) = lookup(ENV_LOG) {
            self.logging.filter = filter.to_string_lossy().into_owned();
        }

        if let Some(paths) = lookup(ENV_MODULE_PATH) {
            self.script
                .module_paths
                .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }

        if let Some(limit) = lookup(ENV_MEMORY_LIMIT) {
            match limit.to_string_lossy().trim().parse::<usize>() {
                Ok(bytes) => self.script.memory_limit = Some(bytes),
                Err(_) => warn!("Ignoring {ENV_MEMORY_LIMIT}={:?}: not a byte count", limit),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.script.max_conversion_depth, 128);
        assert!(settings.script.exceptions_as_errors);
        assert_eq!(settings.script.memory_limit, None);
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "script": {{ "memory_limit": 1048576, "exceptions_as_errors": false }} }}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.script.memory_limit, Some(1_048_576));
        assert!(!settings.script.exceptions_as_errors);
        assert_eq!(settings.script.max_conversion_depth, 128);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn environment_overrides() {
        let first = PathBuf::from("/opt/scripts");
        let second = PathBuf::from("/srv/lib");
        let joined = std::env::join_paths([&first, &second]).unwrap();

        let env: HashMap<&str, OsString> = HashMap::from([
            (ENV_LOG, OsString::from("tether=debug")),
            (ENV_MODULE_PATH, joined),
            (ENV_MEMORY_LIMIT, OsString::from("4096")),
        ]);

        let mut settings = Settings::default();
        settings.apply_env_from(|key| env.get(key).cloned());

        assert_eq!(settings.logging.filter, "tether=debug");
        assert_eq!(settings.script.module_paths, vec![first, second]);
        assert_eq!(settings.script.memory_limit, Some(4096));
    }

    #[test]
    fn bad_memory_limit_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_env_from(|key| (key == ENV_MEMORY_LIMIT).then(|| OsString::from("lots")));
        assert_eq!(settings.script.memory_limit, None);
    }
}
