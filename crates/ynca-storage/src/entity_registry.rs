//! Entity Registry
//!
//! Reads and writes the host's `core.entity_registry` file. Migrations only
//! need to find the entities that belong to a config entry and remove the
//! ones whose kind was retired, so just those fields are typed.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{Envelope, Storable, Storage, StorageResult};
use crate::RegistrySnapshot;

/// Errors that can occur in the entity registry
#[derive(Debug, Error, Clone)]
pub enum EntityRegistryError {
    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Storage key for entity registry
pub const STORAGE_KEY: &str = "core.entity_registry";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 19;

/// A registered entity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Full entity ID (domain.object_id)
    pub entity_id: String,

    /// Integration that provides this entity
    pub platform: String,

    // The host indexes these keys directly, so `None` is written as `null`
    #[serde(default)]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub config_entry_id: Option<String>,

    #[serde(default)]
    pub device_id: Option<String>,

    /// Host fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EntityEntry {
    pub fn new(
        entity_id: impl Into<String>,
        platform: impl Into<String>,
        unique_id: Option<String>,
    ) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "id".to_string(),
            serde_json::Value::String(ulid::Ulid::new().to_string().to_lowercase()),
        );
        Self {
            entity_id: entity_id.into(),
            platform: platform.into(),
            unique_id,
            config_entry_id: None,
            device_id: None,
            extra,
        }
    }

    pub fn with_config_entry(mut self, config_entry_id: impl Into<String>) -> Self {
        self.config_entry_id = Some(config_entry_id.into());
        self
    }

    /// Entity domain, the part of `entity_id` before the dot
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or(&self.entity_id)
    }
}

/// Entity registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistryData {
    pub entities: Vec<EntityEntry>,
    /// Soft-deleted entities, written back as found
    #[serde(default)]
    pub deleted_entities: Vec<serde_json::Value>,
}

impl Storable for EntityRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Entity registry
///
/// Lookups by entity_id, by `(domain, platform, unique_id)` and by
/// config entry.
pub struct EntityRegistry {
    storage: Arc<Storage>,

    /// Primary index: entity_id -> EntityEntry, in file order
    by_entity_id: RwLock<IndexMap<String, Arc<EntityEntry>>>,

    /// Index: (domain, platform, unique_id) -> entity_id
    by_unique_id: DashMap<(String, String, String), String>,

    /// Index: config_entry_id -> set of entity_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,

    deleted: RwLock<Vec<serde_json::Value>>,

    envelope: RwLock<Envelope>,
}

impl EntityRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_entity_id: RwLock::new(IndexMap::new()),
            by_unique_id: DashMap::new(),
            by_config_entry_id: DashMap::new(),
            deleted: RwLock::new(Vec::new()),
            envelope: RwLock::new(EntityRegistryData::new_envelope()),
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load_storable::<EntityRegistryData>().await? {
            info!(
                "Loading {} entities from storage (v{}.{})",
                storage_file.data.entities.len(),
                storage_file.version,
                storage_file.minor_version
            );

            let loaded_envelope = storage_file.envelope();
            for entry in storage_file.data.entities {
                self.index_entry(Arc::new(entry));
            }
            if let Ok(mut envelope) = self.envelope.write() {
                *envelope = loaded_envelope;
            }
            if let Ok(mut deleted) = self.deleted.write() {
                *deleted = storage_file.data.deleted_entities;
            }
        }
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let entities: Vec<EntityEntry> = self
            .by_entity_id
            .read()
            .map(|e| e.values().map(|v| (**v).clone()).collect())
            .unwrap_or_default();
        let deleted_entities = self.deleted.read().map(|d| d.clone()).unwrap_or_default();

        let count = entities.len();
        let data = EntityRegistryData {
            entities,
            deleted_entities,
        };
        let envelope = self
            .envelope
            .read()
            .map(|e| *e)
            .unwrap_or_else(|_| EntityRegistryData::new_envelope());

        self.storage.save(&data.into_storage_file(envelope)).await?;
        debug!("Saved {} entities to storage", count);
        Ok(())
    }

    fn unique_key(entry: &EntityEntry) -> Option<(String, String, String)> {
        entry.unique_id.as_ref().map(|uid| {
            (
                entry.domain().to_string(),
                entry.platform.clone(),
                uid.clone(),
            )
        })
    }

    fn index_entry(&self, entry: Arc<EntityEntry>) {
        let entity_id = entry.entity_id.clone();

        if let Some(key) = Self::unique_key(&entry) {
            self.by_unique_id.insert(key, entity_id.clone());
        }

        if let Some(ref config_entry_id) = entry.config_entry_id {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }

        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entity_id, entry);
        }
    }

    fn unindex_entry(&self, entry: &EntityEntry) {
        if let Some(key) = Self::unique_key(entry) {
            self.by_unique_id.remove(&key);
        }

        if let Some(ref config_entry_id) = entry.config_entry_id {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.entity_id);
            }
        }
    }

    /// Add an entity; an entry with the same entity_id is replaced.
    pub fn register(&self, entry: EntityEntry) -> Arc<EntityEntry> {
        if let Some(existing) = self.get(&entry.entity_id) {
            self.unindex_entry(&existing);
        }
        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));
        debug!("Registered entity: {}", arc_entry.entity_id);
        arc_entry
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    /// Find the entity_id registered for a unique_id of a platform.
    pub fn get_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<String> {
        self.by_unique_id
            .get(&(
                domain.to_string(),
                platform.to_string(),
                unique_id.to_string(),
            ))
            .map(|r| r.value().clone())
    }

    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<EntityEntry>> {
        let Some(ids) = self.by_config_entry_id.get(config_entry_id) else {
            return Vec::new();
        };
        self.by_entity_id
            .read()
            .map(|idx| {
                idx.values()
                    .filter(|e| ids.contains(&e.entity_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, entity_id: &str) -> Result<Arc<EntityEntry>, EntityRegistryError> {
        let arc_entry = self
            .by_entity_id
            .write()
            .ok()
            .and_then(|mut idx| idx.shift_remove(entity_id))
            .ok_or_else(|| EntityRegistryError::NotFound(entity_id.to_string()))?;

        self.unindex_entry(&arc_entry);
        info!("Removed entity: {}", entity_id);
        Ok(arc_entry)
    }

    pub fn snapshot(&self) -> RegistrySnapshot<EntityEntry> {
        RegistrySnapshot {
            entries: self
                .by_entity_id
                .read()
                .map(|idx| idx.values().cloned().collect())
                .unwrap_or_default(),
            deleted: self.deleted.read().map(|d| d.clone()).unwrap_or_default(),
        }
    }

    /// Replace every entry with the snapshot's, in the snapshot's order.
    pub fn restore(&self, snapshot: RegistrySnapshot<EntityEntry>) {
        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.clear();
        }
        self.by_unique_id.clear();
        self.by_config_entry_id.clear();

        for entry in snapshot.entries {
            self.index_entry(entry);
        }
        if let Ok(mut deleted) = self.deleted.write() {
            *deleted = snapshot.deleted;
        }
        debug!("Restored entity registry to {} entities", self.len());
    }

    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
