//! import-inventory - load a spreadsheet CSV export into CouchDB
//!
//! The CSV is staged into railroads, car classes, locations and cars, then
//! migrated like a SQLite snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use railyard_migrate::cli::{init_tracing, run_import, TargetArgs};
use railyard_migrate::inventory::{read_inventory, stage};
use tracing::info;

/// Command-line arguments for import-inventory
#[derive(Parser, Debug)]
#[command(name = "import-inventory")]
#[command(about = "Import an inventory spreadsheet (CSV) into CouchDB")]
#[command(version)]
struct Args {
    /// Path to the inventory CSV
    csv_path: PathBuf,

    #[command(flatten)]
    target: TargetArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.target.resolve_config()?;
    init_tracing(&config.log_level);

    info!("Starting import-inventory v{}", env!("CARGO_PKG_VERSION"));

    let rows = read_inventory(&args.csv_path)
        .await
        .with_context(|| format!("Failed to read inventory {}", args.csv_path.display()))?;
    let snapshot = stage(&rows);

    let report = run_import(&snapshot, &config, args.target.dry_run).await?;
    println!("{}", report);
    Ok(())
}
