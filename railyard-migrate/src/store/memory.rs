//! In-process document store
//!
//! Backs `--dry-run` and the importer tests. Ids are allocated per table
//! starting at 1, like a freshly bootstrapped `counters` document.

use async_trait::async_trait;
use railyard_common::models::SourceTable;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{document_body, DocId, DocumentStore, Fields, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    counters: HashMap<SourceTable, i64>,
    docs: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Document by `_id`
    pub fn get(&self, id: &str) -> Option<Value> {
        self.lock().docs.get(id).cloned()
    }

    /// All documents of one table, in id order
    pub fn documents(&self, table: SourceTable) -> Vec<Value> {
        let mut docs: Vec<Value> = self
            .lock()
            .docs
            .values()
            .filter(|doc| doc["type"] == table.doc_type())
            .cloned()
            .collect();
        docs.sort_by_key(|doc| doc["id"].as_i64());
        docs
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, table: SourceTable, fields: Fields) -> Result<DocId, StoreError> {
        let mut state = self.lock();
        let counter = state.counters.entry(table).or_insert(0);
        *counter += 1;
        let id = DocId::new(table, *counter);
        state.docs.insert(id.to_string(), document_body(&id, fields));
        Ok(id)
    }

    async fn patch(&self, id: &DocId, fields: Fields) -> Result<(), StoreError> {
        let mut state = self.lock();
        let doc = state
            .docs
            .get_mut(&id.to_string())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        doc.extend(fields);
        Ok(())
    }
}
