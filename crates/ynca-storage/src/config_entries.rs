//! Config entries
//!
//! Reads and writes the host's `core.config_entries` file. Only the fields a
//! migration touches are typed; everything else the host stores on an entry
//! is carried through untouched in [`ConfigEntry::extra`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{Envelope, Storable, Storage, StorageResult};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Envelope version of the config entries file
pub const STORAGE_VERSION: u32 = 1;
/// Envelope minor version of the config entries file
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Runtime state of an entry (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    #[default]
    NotLoaded,
    /// Migration and setup running
    SetupInProgress,
    Loaded,
    /// Migration failed; terminal until the host restarts
    MigrationError,
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// ```text
    /// NotLoaded → SetupInProgress → Loaded
    ///                            ↘ MigrationError (terminal)
    /// ```
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        match (self, to) {
            (NotLoaded, SetupInProgress)
            | (SetupInProgress, Loaded)
            | (SetupInProgress, MigrationError) => Ok(to),
            _ => Err(InvalidTransition { from: self, to }),
        }
    }
}

/// A single integration configuration as stored by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,

    /// Integration domain (`yamaha_ynca` for receivers)
    pub domain: String,

    pub title: String,

    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_version")]
    pub minor_version: u32,

    /// Written as `null` when unset
    #[serde(default)]
    pub unique_id: Option<String>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,

    /// Host fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for a failed state
    #[serde(skip, default)]
    pub reason: Option<String>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            modified_at: Utc::now(),
            extra: serde_json::Map::new(),
            state: ConfigEntryState::NotLoaded,
            reason: None,
        }
    }

    pub fn with_entry_id(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = entry_id.into();
        self
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_version(mut self, version: u32, minor_version: u32) -> Self {
        self.version = version;
        self.minor_version = minor_version;
        self
    }

    /// Move to `new_state`, rejecting transitions the lifecycle does not allow.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state = self.state.try_transition(new_state)?;
        self.reason = reason;
        Ok(())
    }
}

/// Fields a migration may rewrite on an entry
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntryUpdate {
    pub title: String,
    pub data: HashMap<String, serde_json::Value>,
    pub options: HashMap<String, serde_json::Value>,
    pub version: u32,
    pub minor_version: u32,
}

/// Config entries file payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config entries store
///
/// Holds every entry of the host, keyed by `entry_id`, with a domain index.
/// Entry order from the file is kept when saving back.
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Load order, so untouched entries are written back where they were
    order: std::sync::RwLock<Vec<String>>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    envelope: std::sync::RwLock<Envelope>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            order: std::sync::RwLock::new(Vec::new()),
            by_domain: DashMap::new(),
            envelope: std::sync::RwLock::new(ConfigEntriesData::new_envelope()),
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load_storable::<ConfigEntriesData>().await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            if let Ok(mut envelope) = self.envelope.write() {
                *envelope = storage_file.envelope();
            }
            for entry in storage_file.data.entries {
                self.insert(entry);
            }
        }
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let ids = self.order.read().map(|o| o.clone()).unwrap_or_default();
        let data = ConfigEntriesData {
            entries: ids.iter().filter_map(|id| self.get(id)).collect(),
        };

        let envelope = self
            .envelope
            .read()
            .map(|e| *e)
            .unwrap_or_else(|_| ConfigEntriesData::new_envelope());

        self.storage.save(&data.into_storage_file(envelope)).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    /// Add an entry (or replace one with the same `entry_id`).
    pub fn insert(&self, entry: ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        if !self.entries.contains_key(&entry_id) {
            if let Ok(mut order) = self.order.write() {
                order.push(entry_id.clone());
            }
        }

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        self.entries.insert(entry_id, entry);
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids = self.order.read().map(|o| o.clone()).unwrap_or_default();
        let Some(domain_ids) = self.by_domain.get(domain) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|id| domain_ids.contains(*id))
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Apply migrated fields to an entry; `None` when the entry is unknown.
    pub fn update(&self, entry_id: &str, update: ConfigEntryUpdate) -> Option<ConfigEntry> {
        let mut entry = self.entries.get_mut(entry_id)?;
        entry.title = update.title;
        entry.data = update.data;
        entry.options = update.options;
        entry.version = update.version;
        entry.minor_version = update.minor_version;
        entry.modified_at = Utc::now();
        debug!("Updated config entry: {}", entry_id);
        Some((*entry).clone())
    }

    /// Put back a previously read copy of an entry. The runtime state and
    /// reason stay as they are; `None` when the entry is unknown.
    pub fn replace(&self, entry: ConfigEntry) -> Option<ConfigEntry> {
        let mut current = self.entries.get_mut(&entry.entry_id)?;
        let state = current.state;
        let reason = current.reason.take();
        *current = ConfigEntry {
            state,
            reason,
            ..entry
        };
        debug!("Replaced config entry: {}", current.entry_id);
        Some((*current).clone())
    }

    /// Move an entry's runtime state; unknown entries are ignored.
    pub fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.try_set_state(state, reason)?;
            debug!("Entry {} state changed to {:?}", entry_id, state);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
