//! Steps rewriting `data`

use serde_json::Value;
use tracing::debug;

use super::StepContext;
use crate::address::normalize_serial_url;
use crate::consts::{DATA_MODELNAME, DATA_SERIAL_URL};
use crate::error::{MigrationError, MigrationResult};
use crate::record::ConfigRecord;

const LEGACY_SERIAL_PORT: &str = "serial_port";

fn normalized(key: &str, value: Value) -> MigrationResult<Value> {
    match value {
        Value::String(raw) => Ok(Value::String(normalize_serial_url(&raw))),
        other => Err(MigrationError::malformed(
            key,
            format!("expected a string, found {other}"),
        )),
    }
}

/// 3.1 -> 4.1: `serial_port` became `serial_url`.
///
/// Network targets were typed as bare addresses; they are stored as
/// `socket://` URLs now. Serial device paths move over unchanged. An entry
/// that somehow has both keys keeps its `serial_url`.
pub fn rename_serial_port_to_serial_url(
    _ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    let legacy = record.data.remove(LEGACY_SERIAL_PORT);

    let current = match (record.data.remove(DATA_SERIAL_URL), legacy) {
        (Some(url), _) => Some(normalized(DATA_SERIAL_URL, url)?),
        (None, Some(port)) => Some(normalized(LEGACY_SERIAL_PORT, port)?),
        (None, None) => None,
    };

    if let Some(url) = current {
        debug!("Entry {} connects via {}", record.entry_id, url);
        record.data.insert(DATA_SERIAL_URL.to_string(), url);
    }
    Ok(record)
}

/// 5.1 -> 6.1: the model name moved from the title into `data`.
pub fn add_modelname_from_title(
    _ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    if !record.data.contains_key(DATA_MODELNAME) {
        record
            .data
            .insert(DATA_MODELNAME.to_string(), Value::String(record.title.clone()));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MigrationMetadata;
    use crate::steps::test_support::{context, FakeHost};
    use serde_json::json;

    fn run(
        step: fn(&StepContext<'_>, ConfigRecord) -> MigrationResult<ConfigRecord>,
        record: ConfigRecord,
    ) -> MigrationResult<ConfigRecord> {
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();
        step(&context(&metadata, &host), record)
    }

    #[test]
    fn test_serial_port_renamed_and_normalized() {
        let record = ConfigRecord::new("entry1", "RX-A810")
            .with_version(3, 1)
            .with_data("serial_port", json!("192.168.1.12"));

        let migrated = run(rename_serial_port_to_serial_url, record).unwrap();

        assert!(!migrated.data.contains_key("serial_port"));
        assert_eq!(migrated.data["serial_url"], json!("socket://192.168.1.12:50000"));
    }

    #[test]
    fn test_serial_device_path_kept_verbatim() {
        let record =
            ConfigRecord::new("entry1", "RX-V671").with_data("serial_port", json!("/dev/ttyUSB0"));

        let migrated = run(rename_serial_port_to_serial_url, record).unwrap();
        assert_eq!(migrated.data["serial_url"], json!("/dev/ttyUSB0"));
    }

    #[test]
    fn test_existing_serial_url_wins() {
        let record = ConfigRecord::new("entry1", "RX-V671")
            .with_data("serial_port", json!("/dev/ttyUSB0"))
            .with_data("serial_url", json!("10.0.0.2:50001"));

        let migrated = run(rename_serial_port_to_serial_url, record).unwrap();
        assert_eq!(migrated.data["serial_url"], json!("socket://10.0.0.2:50001"));
        assert_eq!(migrated.data.len(), 1);
    }

    #[test]
    fn test_non_string_serial_port_is_malformed() {
        let record = ConfigRecord::new("entry1", "RX-V671").with_data("serial_port", json!(12));

        let err = run(rename_serial_port_to_serial_url, record).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::MalformedValue { ref key, .. } if key == "serial_port"
        ));
    }

    #[test]
    fn test_modelname_added_only_when_missing() {
        let record = ConfigRecord::new("entry1", "RX-A810");
        let migrated = run(add_modelname_from_title, record).unwrap();
        assert_eq!(migrated.data["modelname"], json!("RX-A810"));

        let record =
            ConfigRecord::new("entry1", "Living room").with_data("modelname", json!("RX-V475"));
        let migrated = run(add_modelname_from_title, record).unwrap();
        assert_eq!(migrated.data["modelname"], json!("RX-V475"));
    }
}
