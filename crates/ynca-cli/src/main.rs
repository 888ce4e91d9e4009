//! `ynca-migrate`
//!
//! Brings the Yamaha YNCA config entries of a host config directory up to the
//! current schema version, and formats NEC remote codes.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ynca_migrations::{EntryMigrator, MigrationChain, MigrationMetadata, RemoteCode};
use ynca_storage::HostStorage;

use settings::Settings;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "ynca-migrate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate stored config entries to the current version
    Migrate(MigrateArgs),

    /// Format an NEC remote code for @SYS:REMOTECODE
    RemoteCode {
        /// e.g. `7A-1D`, `7A1D` or `7E81-1D`
        code: String,
    },
}

#[derive(Debug, Args)]
struct MigrateArgs {
    /// Host config directory containing `.storage/`
    #[arg(long)]
    config_dir: PathBuf,

    /// YAML file with metadata tables (overrides the settings file)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Print migrated entries instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// Only migrate this entry
    #[arg(long)]
    entry_id: Option<String>,
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(DEFAULT_LOG_LEVEL))),
        )
        .with_target(true)
        .init();
}

async fn migrate(args: MigrateArgs) -> Result<()> {
    let settings = Settings::load(&args.config_dir)?;
    init_tracing(settings.log_level.as_deref());

    let metadata = match args.metadata.or(settings.metadata) {
        Some(path) => MigrationMetadata::from_yaml_file(&path)?,
        None => MigrationMetadata::default(),
    };

    let host = Arc::new(HostStorage::new(&args.config_dir));
    host.load_all()
        .await
        .with_context(|| format!("loading storage in {}", args.config_dir.display()))?;

    let chain = MigrationChain::shipped()?;
    info!(
        "Migrating {} entries in {} to version {}",
        ynca_migrations::DOMAIN,
        args.config_dir.display(),
        chain.current()
    );

    let mut migrator = EntryMigrator::new(host.clone(), chain, metadata);
    if args.dry_run {
        migrator = migrator.dry_run();
    }

    let results = match &args.entry_id {
        Some(entry_id) => vec![(entry_id.clone(), migrator.migrate_entry(entry_id).await)],
        None => migrator.migrate_all().await,
    };

    let mut failed = 0;
    for (entry_id, result) in &results {
        match result {
            Ok(report) if report.migrated() => {
                println!(
                    "{entry_id}: {} -> {} ({})",
                    report.from,
                    report.to,
                    report.steps.join(", ")
                );
                if args.dry_run {
                    if let Some(entry) = host.config_entries.get(entry_id) {
                        println!("{}", serde_json::to_string_pretty(&entry)?);
                    }
                }
            }
            Ok(report) => println!("{entry_id}: up to date ({})", report.to),
            Err(e) => {
                warn!("Entry {} not migrated", entry_id);
                println!("{entry_id}: failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} entries failed to migrate", results.len());
    }
    Ok(())
}

fn remote_code(code: &str) -> Result<()> {
    let code: RemoteCode = code.parse()?;
    println!("{code}");
    println!("{}", code.to_command());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate(args) => migrate(args).await,
        Command::RemoteCode { code } => {
            init_tracing(None);
            remote_code(&code)
        }
    }
}
