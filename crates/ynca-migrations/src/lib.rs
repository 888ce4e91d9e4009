//! Configuration migrations for Yamaha YNCA receiver entries
//!
//! Stored config entries carry a `(version, minor_version)` schema pair. This
//! crate brings entries written by any earlier release up to
//! [`CURRENT_VERSION`]:
//!
//! - [`MigrationChain`] holds one step per stored pair and runs them in order
//! - [`steps`] contains the shipped steps
//! - [`EntryMigrator`] applies the chain to entries in a host `.storage/` dir
//!
//! It also formats NEC infrared remote codes for the `@SYS:REMOTECODE`
//! command, see [`format_remote_code`].
//!
//! # Example
//!
//! ```ignore
//! use ynca_migrations::{EntryMigrator, MigrationChain, MigrationMetadata};
//!
//! let host = Arc::new(HostStorage::new("/config"));
//! host.load_all().await?;
//!
//! let chain = MigrationChain::shipped()?;
//! let migrator = EntryMigrator::new(host, chain, MigrationMetadata::default());
//! for (entry_id, result) in migrator.migrate_all().await {
//!     println!("{entry_id}: {result:?}");
//! }
//! ```

pub mod address;
pub mod chain;
pub mod consts;
pub mod entry;
pub mod error;
pub mod host;
pub mod metadata;
pub mod record;
pub mod remote;
pub mod steps;

pub use address::normalize_serial_url;
pub use chain::{MigrationChain, MigrationOutcome, MigrationReport};
pub use consts::{SchemaVersion, CURRENT_VERSION, DOMAIN};
pub use entry::EntryMigrator;
pub use error::{MetadataError, MetadataResult, MigrationError, MigrationResult};
pub use host::{DeviceRegistryAccess, EntityRegistryAccess, RegisteredEntity};
pub use metadata::{HiddenInputQuirk, MigrationMetadata, SoundModeTable};
pub use record::ConfigRecord;
pub use remote::{format_remote_code, RemoteCode, RemoteCodeError};
pub use steps::{shipped_steps, MigrationStep, StepContext};
