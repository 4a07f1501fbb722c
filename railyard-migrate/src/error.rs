//! Error types for railyard-migrate
//!
//! Input errors (missing or corrupt snapshot) surface before any write.
//! Store errors abort the run where it stands.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for the migration tools
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Snapshot file does not exist
    #[error("Snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),

    /// Snapshot exists but cannot be used
    #[error("Snapshot unreadable: {0}")]
    Snapshot(String),

    /// SQLite query errors while reading the snapshot
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A snapshot row failed to decode into its model
    #[error("Invalid snapshot: {0}")]
    Record(#[from] railyard_common::Error),

    /// Malformed inventory CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A model could not be turned into a document body
    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    /// Target store rejected a write or was unreachable
    #[error("Target store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience Result type using MigrateError
pub type Result<T> = std::result::Result<T, MigrateError>;
