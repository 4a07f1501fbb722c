//! Target document store
//!
//! The importer needs exactly two operations from its target: create a
//! document and receive its new id, and patch fields into a document it
//! created earlier (deferred parent/logo links).

use async_trait::async_trait;
use railyard_common::models::SourceTable;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

mod couch;
mod memory;

pub use couch::CouchStore;
pub use memory::MemoryStore;

/// Document fields, excluding `_id`, `_rev`, `type` and `id`
pub type Fields = Map<String, Value>;

/// Identifier of a document written by the importer
///
/// Rendered as the store's `_id`, `"<type>:<number>"`. Foreign-key fields
/// hold the referenced document's `number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocId {
    pub table: SourceTable,
    pub number: i64,
}

impl DocId {
    pub fn new(table: SourceTable, number: i64) -> Self {
        Self { table, number }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table.doc_type(), self.number)
    }
}

/// Target store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid server URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CouchDB returned {status} for {method} {path}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Document update conflict: {0}")]
    Conflict(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// Where migrated documents go
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document for `table` with a newly allocated id
    async fn create(&self, table: SourceTable, fields: Fields) -> Result<DocId, StoreError>;

    /// Overwrite `fields` on an existing document, keeping everything else
    async fn patch(&self, id: &DocId, fields: Fields) -> Result<(), StoreError>;
}

/// Full document body as the web application reads it back
pub(crate) fn document_body(id: &DocId, fields: Fields) -> Value {
    let mut doc = fields;
    doc.insert("_id".to_string(), json!(id.to_string()));
    doc.insert("type".to_string(), json!(id.table.doc_type()));
    doc.insert("id".to_string(), json!(id.number));
    Value::Object(doc)
}
