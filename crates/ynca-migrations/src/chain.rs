//! Migration chain driver

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::consts::{SchemaVersion, CURRENT_VERSION};
use crate::error::{MigrationError, MigrationResult};
use crate::record::ConfigRecord;
use crate::steps::{shipped_steps, MigrationStep, StepContext};

/// What a migration run did to one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    /// Step names in the order they ran
    pub steps: Vec<&'static str>,
}

impl MigrationReport {
    pub fn migrated(&self) -> bool {
        !self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    pub record: ConfigRecord,
    pub report: MigrationReport,
}

/// Steps keyed by the exact version they start from
///
/// A chain is only constructed when every stored version it knows about leads
/// to `current` in a finite number of steps.
#[derive(Debug, Clone)]
pub struct MigrationChain {
    steps: HashMap<SchemaVersion, MigrationStep>,
    current: SchemaVersion,
}

impl MigrationChain {
    pub fn new(
        steps: impl IntoIterator<Item = MigrationStep>,
        current: SchemaVersion,
    ) -> MigrationResult<Self> {
        let mut by_source: HashMap<SchemaVersion, MigrationStep> = HashMap::new();
        let mut targets: HashSet<SchemaVersion> = HashSet::new();

        for step in steps {
            if step.to <= step.from {
                return Err(MigrationError::InvalidChain(format!(
                    "step {} goes from {} back to {}",
                    step.name, step.from, step.to
                )));
            }
            if step.from == current {
                return Err(MigrationError::InvalidChain(format!(
                    "step {} starts at the current version {}",
                    step.name, current
                )));
            }
            if !targets.insert(step.to) {
                return Err(MigrationError::InvalidChain(format!(
                    "more than one step leads to {}",
                    step.to
                )));
            }
            if let Some(existing) = by_source.insert(step.from, step) {
                return Err(MigrationError::InvalidChain(format!(
                    "steps {} and {} both start at {}",
                    existing.name, step.name, step.from
                )));
            }
        }

        for step in by_source.values() {
            if step.to != current && !by_source.contains_key(&step.to) {
                return Err(MigrationError::InvalidChain(format!(
                    "step {} ends at {} which is neither current nor migrated further",
                    step.name, step.to
                )));
            }
        }

        Ok(Self {
            steps: by_source,
            current,
        })
    }

    /// The steps shipped with this crate, ending at [`CURRENT_VERSION`]
    pub fn shipped() -> MigrationResult<Self> {
        Self::new(shipped_steps(), CURRENT_VERSION)
    }

    pub fn current(&self) -> SchemaVersion {
        self.current
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn needs_migration(&self, version: SchemaVersion) -> bool {
        version != self.current
    }

    /// Step names a record at `version` would go through, without running them
    pub fn plan(&self, version: SchemaVersion) -> MigrationResult<Vec<&'static str>> {
        let mut names = Vec::new();
        let mut version = version;
        while version != self.current {
            let step = self
                .steps
                .get(&version)
                .ok_or(MigrationError::UnknownVersion(version))?;
            names.push(step.name);
            version = step.to;
        }
        Ok(names)
    }

    /// Bring `record` to the current version.
    ///
    /// Steps run one at a time; the record's version is stamped after each
    /// one. The first failing step aborts the run and its error is returned.
    pub fn migrate(
        &self,
        ctx: &StepContext<'_>,
        mut record: ConfigRecord,
    ) -> MigrationResult<MigrationOutcome> {
        let from = record.version;
        let mut applied = Vec::new();

        if !self.needs_migration(from) {
            debug!("Entry {} already at version {}", record.entry_id, from);
        }

        while record.version != self.current {
            let step = self
                .steps
                .get(&record.version)
                .ok_or(MigrationError::UnknownVersion(record.version))?;

            info!(
                "Migrating entry {} from {} to {} ({})",
                record.entry_id, step.from, step.to, step.name
            );
            record = (step.apply)(ctx, record)?;
            record.version = step.to;
            applied.push(step.name);
        }

        let report = MigrationReport {
            from,
            to: record.version,
            steps: applied,
        };
        Ok(MigrationOutcome { record, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MigrationMetadata;
    use crate::steps::test_support::{context, FakeHost};

    fn noop(_ctx: &StepContext<'_>, record: ConfigRecord) -> MigrationResult<ConfigRecord> {
        Ok(record)
    }

    fn failing(_ctx: &StepContext<'_>, _record: ConfigRecord) -> MigrationResult<ConfigRecord> {
        Err(MigrationError::malformed("x", "broken"))
    }

    fn step(name: &'static str, from: (u32, u32), to: (u32, u32)) -> MigrationStep {
        MigrationStep::new(
            name,
            SchemaVersion::new(from.0, from.1),
            SchemaVersion::new(to.0, to.1),
            noop,
        )
    }

    #[test]
    fn test_shipped_chain_is_valid() {
        let chain = MigrationChain::shipped().unwrap();
        assert_eq!(chain.current(), SchemaVersion::new(7, 3));
        assert_eq!(chain.len(), 8);
    }

    #[test]
    fn test_every_shipped_version_reaches_current() {
        let chain = MigrationChain::shipped().unwrap();
        let starts = [(1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1), (7, 1), (7, 2)];

        for (remaining, (major, minor)) in (1..=starts.len()).rev().zip(starts) {
            let plan = chain.plan(SchemaVersion::new(major, minor)).unwrap();
            assert_eq!(plan.len(), remaining, "from {major}.{minor}");
        }
    }

    #[test]
    fn test_current_version_runs_nothing() {
        let chain = MigrationChain::shipped().unwrap();
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        let record = ConfigRecord::new("entry1", "RX-A810").with_version(7, 3);
        let outcome = chain.migrate(&context(&metadata, &host), record.clone()).unwrap();

        assert_eq!(outcome.record, record);
        assert!(!outcome.report.migrated());
        assert_eq!(outcome.report.from, outcome.report.to);
    }

    #[test]
    fn test_unknown_versions_are_stuck() {
        let chain = MigrationChain::shipped().unwrap();
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        for (major, minor) in [(3, 2), (0, 1), (7, 4), (8, 1)] {
            let record = ConfigRecord::new("entry1", "RX-A810").with_version(major, minor);
            let err = chain.migrate(&context(&metadata, &host), record).unwrap_err();
            let expected = SchemaVersion::new(major, minor);
            assert!(
                matches!(err, MigrationError::UnknownVersion(v) if v == expected),
                "{major}.{minor}"
            );
        }
    }

    #[test]
    fn test_versions_stamped_per_step() {
        let chain = MigrationChain::new(
            [step("a", (1, 1), (1, 2)), step("b", (1, 2), (2, 1))],
            SchemaVersion::new(2, 1),
        )
        .unwrap();
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        let outcome = chain
            .migrate(&context(&metadata, &host), ConfigRecord::new("entry1", "RX-A810"))
            .unwrap();

        assert_eq!(outcome.record.version, SchemaVersion::new(2, 1));
        assert_eq!(outcome.report.steps, vec!["a", "b"]);
        assert!(outcome.report.migrated());
    }

    #[test]
    fn test_failing_step_aborts() {
        let chain = MigrationChain::new(
            [
                step("a", (1, 1), (1, 2)),
                MigrationStep::new(
                    "b",
                    SchemaVersion::new(1, 2),
                    SchemaVersion::new(2, 1),
                    failing,
                ),
            ],
            SchemaVersion::new(2, 1),
        )
        .unwrap();
        let metadata = MigrationMetadata::default();
        let host = FakeHost::default();

        let record = ConfigRecord::new("entry1", "RX-A810");
        let result = chain.migrate(&context(&metadata, &host), record);
        assert!(matches!(result, Err(MigrationError::MalformedValue { .. })));
    }

    #[test]
    fn test_malformed_tables_rejected() {
        let current = SchemaVersion::new(3, 1);
        let tables = [
            // duplicate source
            vec![step("a", (1, 1), (2, 1)), step("b", (1, 1), (3, 1)), step("c", (2, 1), (3, 1))],
            // backwards
            vec![step("a", (2, 1), (1, 1))],
            // dead end
            vec![step("a", (1, 1), (2, 1))],
            // two steps into the same version
            vec![step("a", (1, 1), (3, 1)), step("b", (2, 1), (3, 1))],
            // starts at current
            vec![step("a", (1, 1), (3, 1)), step("b", (3, 1), (4, 1))],
        ];

        for steps in tables {
            let names: Vec<_> = steps.iter().map(|s| s.name).collect();
            assert!(
                matches!(
                    MigrationChain::new(steps, current),
                    Err(MigrationError::InvalidChain(_))
                ),
                "{names:?}"
            );
        }
    }
}
