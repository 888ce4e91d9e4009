//! Snapshot of a config entry as seen by the migration steps

use std::collections::HashMap;

use serde_json::Value;
use ynca_storage::{ConfigEntry, ConfigEntryUpdate};

use crate::consts::SchemaVersion;

/// The parts of a config entry a migration reads or rewrites
///
/// Steps take a record by value and return the next one; the driver stamps
/// the version after each step.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub entry_id: String,
    pub title: String,
    pub version: SchemaVersion,
    pub data: HashMap<String, Value>,
    pub options: HashMap<String, Value>,
}

impl ConfigRecord {
    /// A record as created by the first setup flow, at version 1.1
    pub fn new(entry_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
            version: SchemaVersion::new(1, 1),
            data: HashMap::new(),
            options: HashMap::new(),
        }
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.version = SchemaVersion::new(major, minor);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn from_entry(entry: &ConfigEntry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            title: entry.title.clone(),
            version: SchemaVersion::new(entry.version, entry.minor_version),
            data: entry.data.clone(),
            options: entry.options.clone(),
        }
    }

    pub fn into_update(self) -> ConfigEntryUpdate {
        ConfigEntryUpdate {
            title: self.title,
            data: self.data,
            options: self.options,
            version: self.version.major,
            minor_version: self.version.minor,
        }
    }

    /// Model name, falling back to the title that older entries used for it
    pub fn modelname(&self) -> &str {
        self.data
            .get(crate::consts::DATA_MODELNAME)
            .and_then(Value::as_str)
            .unwrap_or(&self.title)
    }
}
