//! Error types for migrations and metadata loading

use std::path::PathBuf;
use thiserror::Error;

use crate::consts::SchemaVersion;

pub type MigrationResult<T> = Result<T, MigrationError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// No step is registered for the stored version and it is not current
    #[error("no migration from version {0}; entry is stuck")]
    UnknownVersion(SchemaVersion),

    /// The step table is not a single chain ending at the current version
    #[error("invalid migration chain: {0}")]
    InvalidChain(String),

    /// A stored value has a shape a step cannot work with
    #[error("malformed value for '{key}': {reason}")]
    MalformedValue { key: String, reason: String },

    /// Entity or device registry failure
    #[error("registry error: {0}")]
    Registry(String),

    #[error("config entry not found: {0}")]
    EntryNotFound(String),

    #[error("config entry {entry_id} belongs to {domain}")]
    WrongDomain { entry_id: String, domain: String },

    #[error(transparent)]
    InvalidState(#[from] ynca_storage::InvalidTransition),

    #[error(transparent)]
    Storage(#[from] ynca_storage::StorageError),
}

impl MigrationError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors loading metadata tables from YAML
#[derive(Debug, Error)]
pub enum MetadataError {
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

    #[error("invalid metadata value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
