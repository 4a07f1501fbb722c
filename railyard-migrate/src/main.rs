//! convert-sqlite - migrate a legacy SQLite snapshot into CouchDB
//!
//! Reads every table of the snapshot read-only, then writes one document per
//! row into the configured database and prints the import report. Exits
//! non-zero when the snapshot is unreadable or a write fails.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use railyard_migrate::cli::{init_tracing, run_import, TargetArgs};
use railyard_migrate::Snapshot;
use tracing::info;

/// Command-line arguments for convert-sqlite
#[derive(Parser, Debug)]
#[command(name = "convert-sqlite")]
#[command(about = "Migrate a legacy SQLite inventory snapshot into CouchDB")]
#[command(version)]
struct Args {
    /// Path to the SQLite snapshot
    sqlite_path: PathBuf,

    #[command(flatten)]
    target: TargetArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.target.resolve_config()?;
    init_tracing(&config.log_level);

    info!("Starting convert-sqlite v{}", env!("CARGO_PKG_VERSION"));

    let snapshot = Snapshot::open(&args.sqlite_path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", args.sqlite_path.display()))?;

    let report = run_import(&snapshot, &config, args.target.dry_run).await?;
    println!("{}", report);
    Ok(())
}
