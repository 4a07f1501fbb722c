//! Shared command-line plumbing for the migration binaries

use anyhow::{Context, Result};
use clap::Args;
use railyard_common::config::{CliOverrides, Config, SCHEMA_VERSION};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::importer::migrate;
use crate::report::ImportReport;
use crate::snapshot::Snapshot;
use crate::store::{CouchStore, MemoryStore};

/// Target database options common to both binaries
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// CouchDB server URL, optionally carrying user:password@
    #[arg(long, env = "COUCHDB_URL")]
    pub couchdb_url: Option<String>,

    /// Database name on the CouchDB server
    #[arg(long, env = "COUCHDB_DATABASE")]
    pub database: Option<String>,

    /// Run the migration against an in-memory store and only print the report
    #[arg(long)]
    pub dry_run: bool,
}

impl TargetArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            couchdb_url: self.couchdb_url.clone(),
            couchdb_database: self.database.clone(),
        }
    }

    /// Resolve the full configuration with these flags on top
    pub fn resolve_config(&self) -> Result<Config> {
        Config::resolve(&self.overrides()).context("Failed to load configuration")
    }
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Migrate a loaded snapshot into the configured target
pub async fn run_import(snapshot: &Snapshot, config: &Config, dry_run: bool) -> Result<ImportReport> {
    if dry_run {
        info!("Dry run: writing to an in-memory store");
        let store = MemoryStore::new();
        return Ok(migrate(snapshot, &store).await?);
    }

    let store = CouchStore::new(&config.couchdb).context("Invalid CouchDB configuration")?;
    info!("Target: {}", store.display_url());
    store
        .bootstrap(SCHEMA_VERSION)
        .await
        .context("Failed to prepare target database")?;

    migrate(snapshot, &store)
        .await
        .context("Migration aborted; clear the target database before retrying")
}
