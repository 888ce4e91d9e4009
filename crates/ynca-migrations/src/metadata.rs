//! Receiver metadata used by the migrations
//!
//! The protocol library owns the enums (sound programs, decoders) and the
//! knowledge of which models lack which inputs. Migrations only read these
//! tables, so they are passed in as a [`MigrationMetadata`] value. The
//! built-in defaults can be overridden from a YAML file:
//!
//! ```yaml
//! sound_modes:
//!   CHURCH_IN_ROYAUMONT: Church in Royaumont
//! hidden_input_quirks:
//!   - input: TV
//!     model_prefixes: [RX-V, HTR-]
//!     exceptions: [RX-V6A]
//! surround_decoders: [dolby_pl, dts_neo_6_cinema]
//! ```
//!
//! Sections left out of the file keep their defaults.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MetadataError, MetadataResult};

/// Sound program enum: member name -> value string sent to the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundModeTable(IndexMap<String, String>);

impl SoundModeTable {
    pub fn new(members: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(members.into_iter().collect())
    }

    /// Value for an enum member name, `None` if the member no longer exists.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const SOUND_PROGRAMS: &[(&str, &str)] = &[
    ("HALL_IN_MUNICH", "Hall in Munich"),
    ("HALL_IN_VIENNA", "Hall in Vienna"),
    ("HALL_IN_AMSTERDAM", "Hall in Amsterdam"),
    ("CHURCH_IN_FREIBURG", "Church in Freiburg"),
    ("CHURCH_IN_ROYAUMONT", "Church in Royaumont"),
    ("CHAMBER", "Chamber"),
    ("VILLAGE_VANGUARD", "Village Vanguard"),
    ("WAREHOUSE_LOFT", "Warehouse Loft"),
    ("CELLAR_CLUB", "Cellar Club"),
    ("THE_ROXY_THEATRE", "The Roxy Theatre"),
    ("THE_BOTTOM_LINE", "The Bottom Line"),
    ("SPORTS", "Sports"),
    ("ACTION_GAME", "Action Game"),
    ("ROLEPLAYING_GAME", "Roleplaying Game"),
    ("MUSIC_VIDEO", "Music Video"),
    ("RECITAL_OPERA", "Recital/Opera"),
    ("STANDARD", "Standard"),
    ("SPECTACLE", "Spectacle"),
    ("SCI_FI", "Sci-Fi"),
    ("ADVENTURE", "Adventure"),
    ("DRAMA", "Drama"),
    ("MONO_MOVIE", "Mono Movie"),
    ("TWO_CH_STEREO", "2ch Stereo"),
    ("FIVE_CH_STEREO", "5ch Stereo"),
    ("SEVEN_CH_STEREO", "7ch Stereo"),
    ("NINE_CH_STEREO", "9ch Stereo"),
    ("ALL_CH_STEREO", "All-Ch Stereo"),
    ("ENHANCED", "Enhanced"),
    ("SURROUND_DECODER", "Surround Decoder"),
];

impl Default for SoundModeTable {
    fn default() -> Self {
        Self::new(
            SOUND_PROGRAMS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        )
    }
}

/// An input some receiver models do not physically have
///
/// A model matches when its name starts with one of `model_prefixes` and is
/// not listed in `exceptions`. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenInputQuirk {
    pub input: String,
    pub model_prefixes: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

impl HiddenInputQuirk {
    pub fn applies_to(&self, modelname: &str) -> bool {
        let model = modelname.trim().to_ascii_uppercase();
        if self
            .exceptions
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(&model))
        {
            return false;
        }
        self.model_prefixes
            .iter()
            .any(|p| model.starts_with(&p.trim().to_ascii_uppercase()))
    }
}

fn default_hidden_input_quirks() -> Vec<HiddenInputQuirk> {
    vec![HiddenInputQuirk {
        input: "TV".to_string(),
        model_prefixes: vec!["RX-V".to_string(), "HTR-".to_string()],
        exceptions: vec![
            "RX-V4A".to_string(),
            "RX-V6A".to_string(),
            "HTR-4072".to_string(),
        ],
    }]
}

fn default_surround_decoders() -> Vec<String> {
    [
        "dolby_pl",
        "dolby_plii_movie",
        "dolby_plii_music",
        "dolby_plii_game",
        "dts_neo_6_cinema",
        "dts_neo_6_music",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

/// Lookup tables handed to the migration steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationMetadata {
    #[serde(default)]
    pub sound_modes: SoundModeTable,

    #[serde(default = "default_hidden_input_quirks")]
    pub hidden_input_quirks: Vec<HiddenInputQuirk>,

    /// Decoders selected when an explicit selection is first introduced
    #[serde(default = "default_surround_decoders")]
    pub surround_decoders: Vec<String>,
}

impl Default for MigrationMetadata {
    fn default() -> Self {
        Self {
            sound_modes: SoundModeTable::default(),
            hidden_input_quirks: default_hidden_input_quirks(),
            surround_decoders: default_surround_decoders(),
        }
    }
}

impl MigrationMetadata {
    pub fn from_yaml_str(content: &str, origin: &Path) -> MetadataResult<Self> {
        let metadata: Self =
            serde_yaml::from_str(content).map_err(|source| MetadataError::ParseYaml {
                path: origin.to_path_buf(),
                source,
            })?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MetadataError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = Self::from_yaml_str(&content, path)?;
        debug!(
            "Loaded migration metadata from {:?}: {} sound modes, {} input quirks",
            path,
            metadata.sound_modes.len(),
            metadata.hidden_input_quirks.len()
        );
        Ok(metadata)
    }

    fn validate(&self) -> MetadataResult<()> {
        for quirk in &self.hidden_input_quirks {
            if quirk.input.trim().is_empty() {
                return Err(MetadataError::InvalidValue {
                    key: "hidden_input_quirks.input".to_string(),
                    reason: "input id must not be empty".to_string(),
                });
            }
            if quirk.model_prefixes.iter().any(|p| p.trim().is_empty()) {
                return Err(MetadataError::InvalidValue {
                    key: "hidden_input_quirks.model_prefixes".to_string(),
                    reason: format!("empty prefix would match every model ({})", quirk.input),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sound_mode_lookup() {
        let table = SoundModeTable::default();
        assert_eq!(table.value_of("CHURCH_IN_ROYAUMONT"), Some("Church in Royaumont"));
        assert_eq!(table.value_of("SCI_FI"), Some("Sci-Fi"));
        assert_eq!(table.value_of("UNSUPPORTED"), None);
    }

    #[test]
    fn test_quirk_matching() {
        let quirk = &default_hidden_input_quirks()[0];
        assert!(quirk.applies_to("RX-V671"));
        assert!(quirk.applies_to("rx-v475"));
        assert!(quirk.applies_to("HTR-4066"));
        assert!(!quirk.applies_to("RX-V6A"));
        assert!(!quirk.applies_to("RX-A810"));
        assert!(!quirk.applies_to(""));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "sound_modes:\n  STRAIGHT: Straight\n";
        let metadata = MigrationMetadata::from_yaml_str(yaml, &PathBuf::from("meta.yaml")).unwrap();

        assert_eq!(metadata.sound_modes.len(), 1);
        assert_eq!(metadata.sound_modes.value_of("STRAIGHT"), Some("Straight"));
        assert_eq!(metadata.hidden_input_quirks, default_hidden_input_quirks());
        assert_eq!(metadata.surround_decoders, default_surround_decoders());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let yaml = "hidden_input_quirks:\n  - input: TV\n    model_prefixes: ['']\n";
        let err = MigrationMetadata::from_yaml_str(yaml, &PathBuf::from("meta.yaml")).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidValue { .. }));
    }

    #[test]
    fn test_bad_yaml_reports_path() {
        let err = MigrationMetadata::from_yaml_str("sound_modes: [", &PathBuf::from("meta.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("meta.yaml"));
    }
}
