//! The shipped migration steps
//!
//! Each step moves a record from exactly one schema version to the next.
//! Steps are plain functions from one [`ConfigRecord`] to the next; the
//! registries are reached through the [`StepContext`].

mod data;
mod options;
mod registry;

pub use data::{add_modelname_from_title, rename_serial_port_to_serial_url};
pub use options::{
    hide_missing_model_inputs, reencode_hidden_sound_modes, split_hidden_inputs_per_zone,
};
pub use registry::{
    remove_scene_entities, select_default_surround_decoders, suffix_device_identifier_with_zone,
};

use std::fmt;

use crate::consts::SchemaVersion;
use crate::error::MigrationResult;
use crate::host::{DeviceRegistryAccess, EntityRegistryAccess};
use crate::metadata::MigrationMetadata;
use crate::record::ConfigRecord;

/// Read-only tables and registry handles available to every step
pub struct StepContext<'a> {
    pub metadata: &'a MigrationMetadata,
    pub entities: &'a dyn EntityRegistryAccess,
    pub devices: &'a dyn DeviceRegistryAccess,
}

pub type StepFn = fn(&StepContext<'_>, ConfigRecord) -> MigrationResult<ConfigRecord>;

/// One registered transition `from -> to`
#[derive(Clone, Copy)]
pub struct MigrationStep {
    pub name: &'static str,
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub apply: StepFn,
}

impl MigrationStep {
    pub const fn new(
        name: &'static str,
        from: SchemaVersion,
        to: SchemaVersion,
        apply: StepFn,
    ) -> Self {
        Self {
            name,
            from,
            to,
            apply,
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

const fn v(major: u32, minor: u32) -> SchemaVersion {
    SchemaVersion::new(major, minor)
}

/// Every step ever shipped, oldest first.
pub fn shipped_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new("remove_scene_entities", v(1, 1), v(2, 1), remove_scene_entities),
        MigrationStep::new(
            "reencode_hidden_sound_modes",
            v(2, 1),
            v(3, 1),
            reencode_hidden_sound_modes,
        ),
        MigrationStep::new(
            "rename_serial_port_to_serial_url",
            v(3, 1),
            v(4, 1),
            rename_serial_port_to_serial_url,
        ),
        MigrationStep::new(
            "split_hidden_inputs_per_zone",
            v(4, 1),
            v(5, 1),
            split_hidden_inputs_per_zone,
        ),
        MigrationStep::new("add_modelname_from_title", v(5, 1), v(6, 1), add_modelname_from_title),
        MigrationStep::new(
            "suffix_device_identifier_with_zone",
            v(6, 1),
            v(7, 1),
            suffix_device_identifier_with_zone,
        ),
        MigrationStep::new(
            "hide_missing_model_inputs",
            v(7, 1),
            v(7, 2),
            hide_missing_model_inputs,
        ),
        MigrationStep::new(
            "select_default_surround_decoders",
            v(7, 2),
            v(7, 3),
            select_default_surround_decoders,
        ),
    ]
}
