//! Steps with entity or device registry side effects

use serde_json::Value;
use tracing::{debug, info};
use ynca_storage::DeviceIdentifier;

use super::StepContext;
use crate::consts::{DOMAIN, OPTION_SELECTED_SURROUND_DECODERS};
use crate::error::MigrationResult;
use crate::record::ConfigRecord;

/// 1.1 -> 2.1: scene entities are no longer provided.
pub fn remove_scene_entities(
    ctx: &StepContext<'_>,
    record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    for entity in ctx.entities.entities_for_config_entry(&record.entry_id) {
        if entity.domain() == "scene" {
            debug!("Entry {}: removing {}", record.entry_id, entity.entity_id);
            ctx.entities.remove_entity(&entity.entity_id)?;
        }
    }
    Ok(record)
}

/// 6.1 -> 7.1: one device per zone; the existing device becomes the main zone.
pub fn suffix_device_identifier_with_zone(
    ctx: &StepContext<'_>,
    record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    let old = DeviceIdentifier::new(DOMAIN, record.entry_id.clone());
    let new = DeviceIdentifier::new(DOMAIN, format!("{}_MAIN", record.entry_id));

    if ctx.devices.replace_identifier(&old, &new)? {
        info!("Entry {}: device {} is now {}", record.entry_id, old.key(), new.key());
    } else {
        debug!("Entry {}: no device registered for {}", record.entry_id, old.key());
    }
    Ok(record)
}

/// 7.2 -> 7.3: the surround decoder select entity became an options setting.
///
/// Entries that had the entity get the default decoder selection; the entity
/// itself is removed. Entries without it are left alone.
pub fn select_default_surround_decoders(
    ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    let unique_id = format!("{}_MAIN_surround_decoder", record.entry_id);
    let Some(entity_id) = ctx.entities.find_entity_id("select", DOMAIN, &unique_id) else {
        return Ok(record);
    };

    if !record.options.contains_key(OPTION_SELECTED_SURROUND_DECODERS) {
        let decoders = ctx
            .metadata
            .surround_decoders
            .iter()
            .cloned()
            .map(Value::String)
            .collect();
        record.options.insert(
            OPTION_SELECTED_SURROUND_DECODERS.to_string(),
            Value::Array(decoders),
        );
    }

    ctx.entities.remove_entity(&entity_id)?;
    info!("Entry {}: replaced {} with decoder options", record.entry_id, entity_id);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MigrationMetadata;
    use crate::steps::test_support::{context, FakeHost};
    use serde_json::json;

    #[test]
    fn test_only_own_scene_entities_removed() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default()
            .with_entity("entry1", "scene.rx_a810_main_scene_1", "entry1_MAIN_1")
            .with_entity("entry1", "media_player.rx_a810_main", "entry1_MAIN")
            .with_entity("entry2", "scene.other_main_scene_1", "entry2_MAIN_1");

        let record = ConfigRecord::new("entry1", "RX-A810");
        let migrated = remove_scene_entities(&context(&metadata, &host), record.clone()).unwrap();

        assert_eq!(migrated, record);
        assert_eq!(
            host.remaining_entity_ids(),
            vec!["media_player.rx_a810_main", "scene.other_main_scene_1"]
        );
    }

    #[test]
    fn test_device_identifier_suffixed() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default().with_device(vec![
            DeviceIdentifier::new(DOMAIN, "entry1"),
            DeviceIdentifier::new("other", "x"),
        ]);

        let record = ConfigRecord::new("entry1", "RX-A810").with_version(6, 1);
        suffix_device_identifier_with_zone(&context(&metadata, &host), record).unwrap();

        assert_eq!(
            host.devices.borrow()[0],
            vec![
                DeviceIdentifier::new(DOMAIN, "entry1_MAIN"),
                DeviceIdentifier::new("other", "x")
            ]
        );
    }

    #[test]
    fn test_missing_device_is_not_an_error() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        let record = ConfigRecord::new("entry1", "RX-A810");
        let migrated =
            suffix_device_identifier_with_zone(&context(&metadata, &host), record.clone()).unwrap();
        assert_eq!(migrated, record);
    }

    #[test]
    fn test_surround_decoder_entity_becomes_option() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default().with_entity(
            "entry1",
            "select.rx_a810_main_surround_decoder",
            "entry1_MAIN_surround_decoder",
        );

        let record = ConfigRecord::new("entry1", "RX-A810").with_version(7, 2);
        let migrated =
            select_default_surround_decoders(&context(&metadata, &host), record).unwrap();

        assert_eq!(
            migrated.options["selected_surround_decoders"],
            json!([
                "dolby_pl",
                "dolby_plii_movie",
                "dolby_plii_music",
                "dolby_plii_game",
                "dts_neo_6_cinema",
                "dts_neo_6_music"
            ])
        );
        assert_eq!(*host.removed.borrow(), vec!["select.rx_a810_main_surround_decoder"]);
    }

    #[test]
    fn test_surround_decoders_untouched_without_entity() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        let record = ConfigRecord::new("entry1", "RX-A810");
        let migrated =
            select_default_surround_decoders(&context(&metadata, &host), record.clone()).unwrap();
        assert_eq!(migrated, record);
    }

    #[test]
    fn test_existing_decoder_selection_kept() {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default().with_entity(
            "entry1",
            "select.rx_a810_main_surround_decoder",
            "entry1_MAIN_surround_decoder",
        );

        let record = ConfigRecord::new("entry1", "RX-A810")
            .with_option("selected_surround_decoders", json!(["dts_neo_6_music"]));
        let migrated =
            select_default_surround_decoders(&context(&metadata, &host), record).unwrap();

        assert_eq!(migrated.options["selected_surround_decoders"], json!(["dts_neo_6_music"]));
        assert!(host.remaining_entity_ids().is_empty());
    }
}
