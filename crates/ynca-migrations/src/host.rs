//! Host registries as seen by the migration steps
//!
//! Steps never touch the registries directly; they go through these traits so
//! tests can hand in fakes and the host adapters stay swappable.

use ynca_storage::{DeviceIdentifier, DeviceRegistry, EntityRegistry};

use crate::error::{MigrationError, MigrationResult};

/// An entity registered by a config entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEntity {
    pub entity_id: String,
    pub platform: String,
    pub unique_id: Option<String>,
}

impl RegisteredEntity {
    /// Entity domain (`scene`, `select`, ...)
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or(&self.entity_id)
    }
}

pub trait EntityRegistryAccess {
    fn entities_for_config_entry(&self, config_entry_id: &str) -> Vec<RegisteredEntity>;

    fn find_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<String>;

    fn remove_entity(&self, entity_id: &str) -> MigrationResult<()>;
}

pub trait DeviceRegistryAccess {
    /// Re-register the device known by `old` under `new`, keeping its other
    /// identifiers and config entry links. `Ok(false)` when no device has `old`.
    fn replace_identifier(
        &self,
        old: &DeviceIdentifier,
        new: &DeviceIdentifier,
    ) -> MigrationResult<bool>;
}

impl EntityRegistryAccess for EntityRegistry {
    fn entities_for_config_entry(&self, config_entry_id: &str) -> Vec<RegisteredEntity> {
        self.get_by_config_entry_id(config_entry_id)
            .into_iter()
            .map(|e| RegisteredEntity {
                entity_id: e.entity_id.clone(),
                platform: e.platform.clone(),
                unique_id: e.unique_id.clone(),
            })
            .collect()
    }

    fn find_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<String> {
        self.get_entity_id(domain, platform, unique_id)
    }

    fn remove_entity(&self, entity_id: &str) -> MigrationResult<()> {
        self.remove(entity_id)
            .map(|_| ())
            .map_err(|e| MigrationError::Registry(e.to_string()))
    }
}

impl DeviceRegistryAccess for DeviceRegistry {
    fn replace_identifier(
        &self,
        old: &DeviceIdentifier,
        new: &DeviceIdentifier,
    ) -> MigrationResult<bool> {
        let Some(device) = self.get_by_identifier(old.domain(), old.id()) else {
            return Ok(false);
        };

        if let Some(other) = self.get_by_identifier(new.domain(), new.id()) {
            if other.id != device.id {
                return Err(MigrationError::Registry(format!(
                    "identifier {} already belongs to device {}",
                    new.key(),
                    other.id
                )));
            }
        }

        self.update(&device.id, |d| {
            let mut identifiers = Vec::with_capacity(d.identifiers.len());
            for ident in d.identifiers.drain(..) {
                let ident = if &ident == old { new.clone() } else { ident };
                if !identifiers.contains(&ident) {
                    identifiers.push(ident);
                }
            }
            d.identifiers = identifiers;
        })
        .ok_or_else(|| MigrationError::Registry(format!("device {} disappeared", device.id)))?;

        Ok(true)
    }
}
