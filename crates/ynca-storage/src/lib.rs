//! Host storage adapters
//!
//! Typed access to the parts of a host `.storage/` directory that YNCA
//! config migrations read and write:
//! - Config entries (`core.config_entries`)
//! - Entities (`core.entity_registry`)
//! - Devices (`core.device_registry`)
//!
//! Every file keeps its version envelope and any field not modelled here.

pub mod storage;

pub mod config_entries;
pub mod device_registry;
pub mod entity_registry;

pub use storage::{Envelope, Storable, Storage, StorageError, StorageFile, StorageResult};

pub use config_entries::{
    ConfigEntries, ConfigEntriesData, ConfigEntry, ConfigEntryState, ConfigEntryUpdate,
    InvalidTransition,
};

pub use device_registry::{DeviceEntry, DeviceIdentifier, DeviceRegistry, DeviceRegistryData};

pub use entity_registry::{EntityEntry, EntityRegistry, EntityRegistryData, EntityRegistryError};

use std::sync::Arc;

/// Registry entries and soft-deleted records at one point in time
#[derive(Debug, Clone)]
pub struct RegistrySnapshot<T> {
    pub(crate) entries: Vec<Arc<T>>,
    pub(crate) deleted: Vec<serde_json::Value>,
}

impl<T> RegistrySnapshot<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both registries, taken before a change set that may have to be undone
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub entities: RegistrySnapshot<EntityEntry>,
    pub devices: RegistrySnapshot<DeviceEntry>,
}

/// The host files bundled together
pub struct HostStorage {
    pub storage: Arc<Storage>,
    pub config_entries: ConfigEntries,
    pub entities: EntityRegistry,
    pub devices: DeviceRegistry,
}

impl HostStorage {
    /// Open the `.storage/` directory below `config_dir`
    pub fn new(config_dir: impl AsRef<std::path::Path>) -> Self {
        let storage = Arc::new(Storage::new(config_dir));

        Self {
            config_entries: ConfigEntries::new(storage.clone()),
            entities: EntityRegistry::new(storage.clone()),
            devices: DeviceRegistry::new(storage.clone()),
            storage,
        }
    }

    pub async fn load_all(&self) -> StorageResult<()> {
        self.config_entries.load().await?;
        self.entities.load().await?;
        self.devices.load().await?;
        Ok(())
    }

    /// Save the registries first and the config entries last, so an
    /// interrupted save leaves entries at their old version and the next run
    /// migrates them again.
    pub async fn save_all(&self) -> StorageResult<()> {
        self.entities.save().await?;
        self.devices.save().await?;
        self.config_entries.save().await?;
        Ok(())
    }

    pub fn snapshot_registries(&self) -> HostSnapshot {
        HostSnapshot {
            entities: self.entities.snapshot(),
            devices: self.devices.snapshot(),
        }
    }

    /// Put both registries back to `snapshot`, dropping later changes.
    pub fn restore_registries(&self, snapshot: HostSnapshot) {
        self.entities.restore(snapshot.entities);
        self.devices.restore(snapshot.devices);
    }
}
