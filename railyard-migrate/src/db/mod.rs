//! Snapshot database access
//!
//! The legacy SQLite file is only ever read. Connections use `mode=ro` and
//! `immutable=1`, so a migration can never alter its own source.

use sqlx::SqlitePool;
use std::path::Path;

use crate::error::{MigrateError, Result};

mod tables;
pub use tables::{fetch_rows, list_tables, table_exists, table_names, TableInfo};

/// Connect to a snapshot in read-only mode
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(MigrateError::SnapshotNotFound(db_path.to_path_buf()));
    }
    if !db_path.is_file() {
        return Err(MigrateError::Snapshot(format!(
            "{} is not a file",
            db_path.display()
        )));
    }

    // mode=ro: Read-only mode
    // immutable=1: SQLite won't write even for internal operations
    let db_url = format!("sqlite://{}?mode=ro&immutable=1", db_path.display());

    let pool = SqlitePool::connect(&db_url).await?;

    // Verify read-only by attempting a write (should fail)
    #[cfg(debug_assertions)]
    {
        let write_test = sqlx::query("CREATE TABLE _railyard_write_probe (id INTEGER)")
            .execute(&pool)
            .await;
        if write_test.is_ok() {
            return Err(MigrateError::Snapshot(
                "connection is not read-only".to_string(),
            ));
        }
    }

    Ok(pool)
}
