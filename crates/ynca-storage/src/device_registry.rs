//! Device Registry
//!
//! Reads and writes the host's `core.device_registry` file with identifier
//! and config-entry indexes.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Envelope, Storable, Storage, StorageResult};
use crate::RegistrySnapshot;

/// Storage key for device registry
pub const STORAGE_KEY: &str = "core.device_registry";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 12;

/// A device identifier `(domain, id)`, stored as a two element array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    /// Index key
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// A registered device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,

    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,

    /// Config entries this device is linked to
    #[serde(default)]
    pub config_entries: Vec<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Host fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceEntry {
    pub fn new(name: Option<&str>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            identifiers: Vec::new(),
            config_entries: Vec::new(),
            name: name.map(String::from),
            model: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_identifier(mut self, domain: impl Into<String>, id: impl Into<String>) -> Self {
        self.identifiers.push(DeviceIdentifier::new(domain, id));
        self
    }

    pub fn with_config_entry(mut self, config_entry_id: impl Into<String>) -> Self {
        let config_entry_id = config_entry_id.into();
        if !self.config_entries.contains(&config_entry_id) {
            self.config_entries.push(config_entry_id);
        }
        self
    }
}

/// Device registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistryData {
    pub devices: Vec<DeviceEntry>,
    /// Soft-deleted devices, written back as found
    #[serde(default)]
    pub deleted_devices: Vec<serde_json::Value>,
}

impl Storable for DeviceRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Device registry
///
/// Entries are stored as `Arc<DeviceEntry>`; updates swap in a new `Arc`.
pub struct DeviceRegistry {
    storage: Arc<Storage>,

    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// File order of device ids
    order: std::sync::RwLock<Vec<String>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,

    deleted: std::sync::RwLock<Vec<serde_json::Value>>,

    envelope: std::sync::RwLock<Envelope>,
}

impl DeviceRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_id: DashMap::new(),
            order: std::sync::RwLock::new(Vec::new()),
            by_identifier: DashMap::new(),
            by_config_entry_id: DashMap::new(),
            deleted: std::sync::RwLock::new(Vec::new()),
            envelope: std::sync::RwLock::new(DeviceRegistryData::new_envelope()),
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load_storable::<DeviceRegistryData>().await? {
            info!(
                "Loading {} devices from storage (v{}.{})",
                storage_file.data.devices.len(),
                storage_file.version,
                storage_file.minor_version
            );

            let loaded_envelope = storage_file.envelope();
            for entry in storage_file.data.devices {
                self.register(entry);
            }
            if let Ok(mut envelope) = self.envelope.write() {
                *envelope = loaded_envelope;
            }
            if let Ok(mut deleted) = self.deleted.write() {
                *deleted = storage_file.data.deleted_devices;
            }
        }
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let ids = self.order.read().map(|o| o.clone()).unwrap_or_default();
        let data = DeviceRegistryData {
            devices: ids
                .iter()
                .filter_map(|id| self.get(id))
                .map(|d| (*d).clone())
                .collect(),
            deleted_devices: self.deleted.read().map(|d| d.clone()).unwrap_or_default(),
        };

        let envelope = self
            .envelope
            .read()
            .map(|e| *e)
            .unwrap_or_else(|_| DeviceRegistryData::new_envelope());

        self.storage.save(&data.into_storage_file(envelope)).await?;
        debug!("Saved {} devices to storage", self.by_id.len());
        Ok(())
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();

        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier.key(), device_id.clone());
        }

        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }
        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.id);
            }
        }
    }

    /// Add a device; a device with the same id is replaced.
    pub fn register(&self, entry: DeviceEntry) -> Arc<DeviceEntry> {
        if let Some((_, existing)) = self.by_id.remove(&entry.id) {
            self.unindex_entry(&existing);
        } else if let Ok(mut order) = self.order.write() {
            order.push(entry.id.clone());
        }
        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));
        arc_entry
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        let key = DeviceIdentifier::new(domain, id).key();
        self.by_identifier
            .get(&key)
            .and_then(|device_id| self.get(&device_id))
    }

    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Update a device entry, re-indexing it afterwards.
    pub fn update<F>(&self, device_id: &str, f: F) -> Option<Arc<DeviceEntry>>
    where
        F: FnOnce(&mut DeviceEntry),
    {
        // Remove first so no shard lock is held while re-indexing
        let (_, arc_entry) = self.by_id.remove(device_id)?;
        self.unindex_entry(&arc_entry);

        let mut entry = (*arc_entry).clone();
        f(&mut entry);

        let new_arc = Arc::new(entry);
        self.index_entry(Arc::clone(&new_arc));
        debug!("Updated device: {}", device_id);
        Some(new_arc)
    }

    pub fn snapshot(&self) -> RegistrySnapshot<DeviceEntry> {
        let ids = self.order.read().map(|o| o.clone()).unwrap_or_default();
        RegistrySnapshot {
            entries: ids.iter().filter_map(|id| self.get(id)).collect(),
            deleted: self.deleted.read().map(|d| d.clone()).unwrap_or_default(),
        }
    }

    /// Replace every device with the snapshot's, in the snapshot's order.
    pub fn restore(&self, snapshot: RegistrySnapshot<DeviceEntry>) {
        self.by_id.clear();
        self.by_identifier.clear();
        self.by_config_entry_id.clear();

        if let Ok(mut order) = self.order.write() {
            *order = snapshot.entries.iter().map(|d| d.id.clone()).collect();
        }
        for entry in snapshot.entries {
            self.index_entry(entry);
        }
        if let Ok(mut deleted) = self.deleted.write() {
            *deleted = snapshot.deleted;
        }
        debug!("Restored device registry to {} devices", self.by_id.len());
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
