//! Steps rewriting `options`

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::StepContext;
use crate::consts::{OPTION_HIDDEN_INPUTS, OPTION_HIDDEN_SOUND_MODES, ZONES};
use crate::error::{MigrationError, MigrationResult};
use crate::record::ConfigRecord;

/// Strings of a stored list, duplicates removed, order kept.
fn string_list(key: &str, value: Value) -> MigrationResult<Vec<String>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(MigrationError::malformed(
                key,
                format!("expected a list, found {other}"),
            ))
        }
    };

    let mut strings: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(s) = item else {
            return Err(MigrationError::malformed(
                key,
                format!("expected a list of strings, found {item}"),
            ));
        };
        if !strings.contains(&s) {
            strings.push(s);
        }
    }
    Ok(strings)
}

fn zone_settings_mut<'a>(
    options: &'a mut HashMap<String, Value>,
    zone: &str,
) -> MigrationResult<&'a mut Map<String, Value>> {
    options
        .entry(zone.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| MigrationError::malformed(zone, "expected a mapping of zone settings"))
}

/// 2.1 -> 3.1: hidden sound modes were stored by enum member name.
///
/// They are stored by value now. Names the enum no longer has are dropped.
pub fn reencode_hidden_sound_modes(
    ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    let Some(stored) = record.options.remove(OPTION_HIDDEN_SOUND_MODES) else {
        return Ok(record);
    };

    let mut values: Vec<Value> = Vec::new();
    for name in string_list(OPTION_HIDDEN_SOUND_MODES, stored)? {
        match ctx.metadata.sound_modes.value_of(&name) {
            Some(value) => {
                let value = Value::String(value.to_string());
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => warn!(
                "Entry {}: dropping unsupported hidden sound mode {}",
                record.entry_id, name
            ),
        }
    }

    record
        .options
        .insert(OPTION_HIDDEN_SOUND_MODES.to_string(), Value::Array(values));
    Ok(record)
}

/// 4.1 -> 5.1: `hidden_inputs_<ZONE>` options moved into per-zone settings.
///
/// Zones without hidden inputs get no settings record at all.
pub fn split_hidden_inputs_per_zone(
    _ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    for zone in ZONES {
        let legacy_key = format!("{OPTION_HIDDEN_INPUTS}_{zone}");
        let Some(legacy) = record.options.remove(&legacy_key) else {
            continue;
        };

        let inputs = string_list(&legacy_key, legacy)?;
        if inputs.is_empty() {
            continue;
        }

        let settings = zone_settings_mut(&mut record.options, zone)?;
        let mut hidden = match settings.remove(OPTION_HIDDEN_INPUTS) {
            Some(existing) => string_list(OPTION_HIDDEN_INPUTS, existing)?,
            None => Vec::new(),
        };
        for input in inputs {
            if !hidden.contains(&input) {
                hidden.push(input);
            }
        }

        settings.insert(
            OPTION_HIDDEN_INPUTS.to_string(),
            Value::Array(hidden.into_iter().map(Value::String).collect()),
        );
    }
    Ok(record)
}

/// 7.1 -> 7.2: hide inputs the receiver model does not physically have.
///
/// Only zones that already customise their hidden inputs are touched; a zone
/// without customisation shows the receiver's own input list and stays that
/// way.
pub fn hide_missing_model_inputs(
    ctx: &StepContext<'_>,
    mut record: ConfigRecord,
) -> MigrationResult<ConfigRecord> {
    let model = record.modelname().to_string();

    for quirk in ctx
        .metadata
        .hidden_input_quirks
        .iter()
        .filter(|q| q.applies_to(&model))
    {
        for zone in ZONES {
            let Some(settings) = record.options.get_mut(zone) else {
                continue;
            };
            let settings = settings.as_object_mut().ok_or_else(|| {
                MigrationError::malformed(zone, "expected a mapping of zone settings")
            })?;
            let Some(hidden) = settings.get_mut(OPTION_HIDDEN_INPUTS) else {
                continue;
            };
            let hidden = hidden.as_array_mut().ok_or_else(|| {
                MigrationError::malformed(OPTION_HIDDEN_INPUTS, "expected a list")
            })?;

            if hidden.is_empty() || hidden.iter().any(|v| v.as_str() == Some(&quirk.input)) {
                continue;
            }
            hidden.push(Value::String(quirk.input.clone()));
            info!(
                "Entry {}: hiding input {} on {} for model {}",
                record.entry_id, quirk.input, zone, model
            );
        }
    }
    Ok(record)
}
