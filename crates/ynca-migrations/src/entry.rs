//! Migrating stored config entries
//!
//! Glue between the chain and the host storage: reads an entry, runs the
//! chain over it with the registries as collaborators and writes the result
//! back. A failed run puts the entry and both registries back the way they
//! were before the run and marks the entry `MigrationError` for the rest of
//! the session.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};
use ynca_storage::{ConfigEntry, ConfigEntryState, HostStorage};

use crate::chain::{MigrationChain, MigrationReport};
use crate::consts::{SchemaVersion, DOMAIN};
use crate::error::{MigrationError, MigrationResult};
use crate::metadata::MigrationMetadata;
use crate::record::ConfigRecord;
use crate::steps::StepContext;

pub struct EntryMigrator {
    host: Arc<HostStorage>,
    chain: MigrationChain,
    metadata: MigrationMetadata,
    persist: bool,
    /// One entry at a time; steps share the registries
    migrate_lock: Mutex<()>,
}

impl EntryMigrator {
    pub fn new(host: Arc<HostStorage>, chain: MigrationChain, metadata: MigrationMetadata) -> Self {
        Self {
            host,
            chain,
            metadata,
            persist: true,
            migrate_lock: Mutex::new(()),
        }
    }

    /// Keep migrated entries in memory only
    pub fn dry_run(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn host(&self) -> &HostStorage {
        &self.host
    }

    /// Migrate one entry of this integration.
    ///
    /// Calling this again for an entry that is already `Loaded` at the
    /// current version returns an empty report.
    pub async fn migrate_entry(&self, entry_id: &str) -> MigrationResult<MigrationReport> {
        let _lock = self.migrate_lock.lock().await;

        let entry = self
            .host
            .config_entries
            .get(entry_id)
            .ok_or_else(|| MigrationError::EntryNotFound(entry_id.to_string()))?;

        if entry.domain != DOMAIN {
            return Err(MigrationError::WrongDomain {
                entry_id: entry_id.to_string(),
                domain: entry.domain,
            });
        }

        let version = SchemaVersion::new(entry.version, entry.minor_version);
        if entry.state == ConfigEntryState::Loaded && !self.chain.needs_migration(version) {
            debug!("Entry {} ({}) already loaded", entry.title, entry_id);
            return Ok(MigrationReport {
                from: version,
                to: version,
                steps: Vec::new(),
            });
        }

        self.host
            .config_entries
            .set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let snapshot = self.host.snapshot_registries();
        let report = match self.run(&entry).await {
            Ok(report) => report,
            Err(e) => {
                error!("Migration of entry {} ({}) failed: {}", entry.title, entry_id, e);
                self.host.restore_registries(snapshot);
                self.host.config_entries.replace(entry.clone());
                self.host.config_entries.set_state(
                    entry_id,
                    ConfigEntryState::MigrationError,
                    Some(e.to_string()),
                )?;
                return Err(e);
            }
        };

        self.host
            .config_entries
            .set_state(entry_id, ConfigEntryState::Loaded, None)?;
        Ok(report)
    }

    /// Run the chain over `entry` and store the result. Registry changes
    /// made on the way are left for the caller to roll back on error.
    async fn run(&self, entry: &ConfigEntry) -> MigrationResult<MigrationReport> {
        let ctx = StepContext {
            metadata: &self.metadata,
            entities: &self.host.entities,
            devices: &self.host.devices,
        };

        let outcome = self.chain.migrate(&ctx, ConfigRecord::from_entry(entry))?;
        let report = outcome.report;
        if !report.migrated() {
            debug!("Entry {} ({}) is up to date", entry.title, entry.entry_id);
            return Ok(report);
        }

        self.host
            .config_entries
            .update(&entry.entry_id, outcome.record.into_update())
            .ok_or_else(|| MigrationError::EntryNotFound(entry.entry_id.clone()))?;

        if self.persist {
            self.host.save_all().await?;
        }
        info!(
            "Migrated entry {} ({}) from {} to {}",
            entry.title, entry.entry_id, report.from, report.to
        );
        Ok(report)
    }

    /// Migrate every entry of this integration, in stored order.
    ///
    /// A failing entry does not stop the others.
    pub async fn migrate_all(&self) -> Vec<(String, MigrationResult<MigrationReport>)> {
        let entries = self.host.config_entries.get_by_domain(DOMAIN);
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            let result = self.migrate_entry(&entry.entry_id).await;
            results.push((entry.entry_id, result));
        }

        results
    }
}
