//! Optional `ynca-migrate.yaml` in the config directory
//!
//! ```yaml
//! log_level: debug
//! metadata: ynca-metadata.yaml
//! ```
//!
//! A relative `metadata` path is resolved against the config directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const SETTINGS_FILE: &str = "ynca-migrate.yaml";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    /// `tracing` filter directive, e.g. `info` or `ynca_migrations=debug`
    #[serde(default)]
    pub log_level: Option<String>,

    /// Metadata tables overriding the built-in ones
    #[serde(default)]
    pub metadata: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `config_dir`; a missing file means defaults.
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SETTINGS_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        // An empty file parses as null
        let settings: Option<Self> = serde_yaml::from_str(&content)
            .map_err(|source| ConfigError::ParseYaml {
                path: path.clone(),
                source,
            })?;
        let mut settings = settings.unwrap_or_default();

        if let Some(level) = &settings.log_level {
            EnvFilter::try_new(level).map_err(|e| ConfigError::InvalidValue {
                key: "log_level".to_string(),
                reason: e.to_string(),
            })?;
        }

        if let Some(metadata) = settings.metadata.take() {
            settings.metadata = Some(if metadata.is_relative() {
                config_dir.join(metadata)
            } else {
                metadata
            });
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(SETTINGS_FILE), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(Settings::load(temp_dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        write_settings(&temp_dir, "");
        assert_eq!(Settings::load(temp_dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_relative_metadata_path() {
        let temp_dir = TempDir::new().unwrap();
        write_settings(&temp_dir, "log_level: debug\nmetadata: tables.yaml\n");

        let settings = Settings::load(temp_dir.path()).unwrap();
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.metadata, Some(temp_dir.path().join("tables.yaml")));
    }

    #[test]
    fn test_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_settings(&temp_dir, "log_level: [unclosed");

        let result = Settings::load(temp_dir.path());
        assert!(matches!(result, Err(ConfigError::ParseYaml { .. })));
    }

    #[test]
    fn test_invalid_log_level() {
        let temp_dir = TempDir::new().unwrap();
        write_settings(&temp_dir, "log_level: \"ynca=[\"\n");

        let result = Settings::load(temp_dir.path());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "log_level"
        ));
    }
}
