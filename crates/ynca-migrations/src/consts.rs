//! Names shared by the config entry and the migrations

use std::fmt;

/// Integration domain of Yamaha YNCA config entries
pub const DOMAIN: &str = "yamaha_ynca";

/// Zone identifiers, in the order the receiver numbers them
pub const ZONES: [&str; 4] = ["MAIN", "ZONE2", "ZONE3", "ZONE4"];

pub const DATA_SERIAL_URL: &str = "serial_url";
pub const DATA_MODELNAME: &str = "modelname";

/// Per-zone option holding the input ids removed from the source list
pub const OPTION_HIDDEN_INPUTS: &str = "hidden_inputs";
pub const OPTION_HIDDEN_SOUND_MODES: &str = "hidden_sound_modes";
pub const OPTION_SELECTED_SURROUND_DECODERS: &str = "selected_surround_decoders";

/// Port the receiver listens on for YNCA over TCP
pub const DEFAULT_YNCA_PORT: u16 = 50000;

/// Schema generation of a config entry, `(version, minor_version)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Schema written by the current integration
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(7, 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_ordering() {
        assert!(SchemaVersion::new(6, 1) < SchemaVersion::new(7, 1));
        assert!(SchemaVersion::new(7, 1) < SchemaVersion::new(7, 2));
        assert_eq!(CURRENT_VERSION.to_string(), "7.3");
    }
}
