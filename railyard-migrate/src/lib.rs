//! railyard-migrate library - snapshot import into the document store
//!
//! Reads a relational snapshot (the legacy SQLite database, or a spreadsheet
//! CSV export staged into the same shape) and writes equivalent documents
//! into CouchDB, remapping integer foreign keys to the new document ids.

pub mod cli;
pub mod db;
pub mod error;
pub mod importer;
pub mod inventory;
pub mod report;
pub mod snapshot;
pub mod store;

pub use error::MigrateError;
pub use importer::migrate;
pub use report::{ImportReport, ImportWarning};
pub use snapshot::Snapshot;
pub use store::{CouchStore, DocId, DocumentStore, MemoryStore, StoreError};
