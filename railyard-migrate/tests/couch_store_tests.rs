//! CouchStore tests against an in-process fake CouchDB
//!
//! The fake speaks just enough of the CouchDB document API: database PUT,
//! document GET/PUT with `_rev` checking, and injectable 409 conflicts.

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::put;
use axum::{Json, Router};
use railyard_common::config::{CouchConfig, SCHEMA_VERSION};
use railyard_common::models::{Car, Railroad, SourceTable};
use railyard_migrate::{migrate, CouchStore, DocumentStore, MigrateError, Snapshot, StoreError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const DB: &str = "model_inventory";

#[derive(Default)]
struct FakeState {
    databases: HashSet<String>,
    docs: HashMap<String, Value>,
    revisions: u64,
    /// Conflicts still to return for writes to `counters`
    counter_conflicts: usize,
    /// Conflicts still to return for writes to existing entity documents
    doc_conflicts: usize,
    /// Reject every document write with a 500
    fail_writes: bool,
    auth_headers: Vec<Option<String>>,
}

#[derive(Clone, Default)]
struct FakeCouch {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCouch {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn doc(&self, id: &str) -> Option<Value> {
        self.with(|s| s.docs.get(&format!("{}/{}", DB, id)).cloned())
    }
}

fn record_auth(state: &mut FakeState, headers: &HeaderMap) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.auth_headers.push(auth);
}

async fn put_database(
    State(fake): State<FakeCouch>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    fake.with(|state| {
        record_auth(state, &headers);
        if state.databases.insert(db) {
            (StatusCode::CREATED, Json(json!({"ok": true})))
        } else {
            (
                StatusCode::PRECONDITION_FAILED,
                Json(json!({"error": "file_exists"})),
            )
        }
    })
}

async fn get_doc(
    State(fake): State<FakeCouch>,
    Path((db, doc_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let key = format!("{}/{}", db, doc_id.trim_start_matches('/'));
    fake.with(|state| {
        record_auth(state, &headers);
        match state.docs.get(&key) {
            Some(doc) => (StatusCode::OK, Json(doc.clone())),
            None => (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))),
        }
    })
}

async fn put_doc(
    State(fake): State<FakeCouch>,
    Path((db, doc_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let doc_id = doc_id.trim_start_matches('/').to_string();
    let key = format!("{}/{}", db, doc_id);
    fake.with(|state| {
        record_auth(state, &headers);
        if state.fail_writes {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "disk_full"})),
            );
        }
        if doc_id == "counters" && state.counter_conflicts > 0 {
            state.counter_conflicts -= 1;
            return (StatusCode::CONFLICT, Json(json!({"error": "conflict"})));
        }
        if doc_id != "counters" && state.doc_conflicts > 0 && state.docs.contains_key(&key) {
            state.doc_conflicts -= 1;
            return (StatusCode::CONFLICT, Json(json!({"error": "conflict"})));
        }

        let current_rev = state.docs.get(&key).map(|d| d["_rev"].clone());
        let supplied_rev = body.get("_rev").cloned();
        if current_rev != supplied_rev {
            return (StatusCode::CONFLICT, Json(json!({"error": "conflict"})));
        }

        state.revisions += 1;
        let rev = format!("{}-fake", state.revisions);
        body["_rev"] = json!(rev);
        state.docs.insert(key, body);
        (
            StatusCode::CREATED,
            Json(json!({"ok": true, "id": doc_id, "rev": rev})),
        )
    })
}

/// Start the fake on an ephemeral port; returns its base URL
async fn start_fake(fake: FakeCouch, credentials: &str) -> String {
    let app = Router::new()
        .route("/:db", put(put_database))
        .route("/:db/*doc_id", put(put_doc).get(get_doc))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}{}/", credentials, addr)
}

async fn bootstrapped_store(fake: &FakeCouch) -> CouchStore {
    let url = start_fake(fake.clone(), "admin:secret@").await;
    let store = CouchStore::new(&CouchConfig {
        url,
        database: DB.to_string(),
    })
    .unwrap();
    store.bootstrap(SCHEMA_VERSION).await.unwrap();
    store
}

#[tokio::test]
async fn test_bootstrap_prepares_target() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;

    let counters = fake.doc("counters").unwrap();
    for table in SourceTable::ALL {
        assert_eq!(counters[table.counter_key()], 0, "{}", table);
    }
    let design = fake.doc("_design/indexes").unwrap();
    assert!(design["views"]["by_type_id"]["map"]
        .as_str()
        .unwrap()
        .contains("emit([doc.type, doc.id], null)"));
    assert_eq!(fake.doc("schema_version").unwrap()["version"], SCHEMA_VERSION);

    // A second bootstrap finds everything in place and rewrites nothing.
    let revisions = fake.with(|s| s.revisions);
    store.bootstrap(SCHEMA_VERSION).await.unwrap();
    assert_eq!(fake.with(|s| s.revisions), revisions);
}

#[tokio::test]
async fn test_bootstrap_adds_missing_counters_and_updates_version() {
    let fake = FakeCouch::default();
    fake.with(|s| {
        s.databases.insert(DB.to_string());
        s.docs.insert(
            format!("{}/counters", DB),
            json!({"_id": "counters", "_rev": "1-seed", "cars": 41}),
        );
        s.docs.insert(
            format!("{}/schema_version", DB),
            json!({"_id": "schema_version", "_rev": "1-seed", "type": "schema_version", "version": "1.0.0"}),
        );
    });

    bootstrapped_store(&fake).await;

    let counters = fake.doc("counters").unwrap();
    assert_eq!(counters["cars"], 41);
    assert_eq!(counters["railroad_slogans"], 0);
    assert_eq!(fake.doc("schema_version").unwrap()["version"], SCHEMA_VERSION);
}

#[tokio::test]
async fn test_create_writes_application_document_shape() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;

    let mut fields = serde_json::Map::new();
    fields.insert("name".to_string(), json!("Penn Central"));
    let id = store.create(SourceTable::Railroads, fields).await.unwrap();

    assert_eq!(id.to_string(), "railroad:1");
    let doc = fake.doc("railroad:1").unwrap();
    assert_eq!(doc["_id"], "railroad:1");
    assert_eq!(doc["type"], "railroad");
    assert_eq!(doc["id"], 1);
    assert_eq!(doc["name"], "Penn Central");
    assert_eq!(fake.doc("counters").unwrap()["railroads"], 1);
}

#[tokio::test]
async fn test_counter_conflicts_are_retried() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;
    fake.with(|s| s.counter_conflicts = 2);

    let first = store.next_id(SourceTable::Cars).await.unwrap();
    let second = store.next_id(SourceTable::Cars).await.unwrap();

    assert_eq!((first, second), (1, 2));
    assert_eq!(fake.with(|s| s.counter_conflicts), 0);
}

#[tokio::test]
async fn test_patch_conflict_is_reported_not_retried() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;
    let id = store
        .create(SourceTable::Railroads, serde_json::Map::new())
        .await
        .unwrap();
    fake.with(|s| s.doc_conflicts = 2);

    let mut fields = serde_json::Map::new();
    fields.insert("representative_logo_id".to_string(), json!(1));
    let err = store.patch(&id, fields).await.unwrap_err();

    assert!(matches!(err, StoreError::Conflict(ref doc) if doc == "railroad:1"));
    assert_eq!(fake.with(|s| s.doc_conflicts), 1);
    assert_eq!(fake.doc("railroad:1").unwrap()["representative_logo_id"], Value::Null);
}

#[tokio::test]
async fn test_totals_are_maintained_when_present() {
    let fake = FakeCouch::default();
    fake.with(|s| {
        s.databases.insert(DB.to_string());
        s.docs.insert(
            format!("{}/counters", DB),
            json!({"_id": "counters", "_rev": "1-seed", "cars": 0, "cars_total": 5}),
        );
    });
    let store = bootstrapped_store(&fake).await;

    store.next_id(SourceTable::Cars).await.unwrap();
    store.next_id(SourceTable::Railroads).await.unwrap();

    let counters = fake.doc("counters").unwrap();
    assert_eq!(counters["cars"], 1);
    assert_eq!(counters["cars_total"], 6);
    assert!(counters.get("railroads_total").is_none());
}

#[tokio::test]
async fn test_credentials_sent_as_basic_auth() {
    let fake = FakeCouch::default();
    bootstrapped_store(&fake).await;

    let headers = fake.with(|s| s.auth_headers.clone());
    assert!(!headers.is_empty());
    assert!(headers
        .iter()
        .all(|h| h.as_deref() == Some("Basic YWRtaW46c2VjcmV0")));
}

#[tokio::test]
async fn test_migration_through_couch() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;
    let snapshot = Snapshot {
        railroads: vec![Railroad {
            id: 9,
            name: Some("Erie".to_string()),
            ..Default::default()
        }],
        cars: vec![Car {
            id: 4,
            railroad_id: Some(9),
            car_number: Some("1001".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let report = migrate(&snapshot, &store).await.unwrap();

    assert_eq!(report.documents_written(), 2);
    assert_eq!(fake.doc("car:1").unwrap()["railroad_id"], 1);
    assert_eq!(fake.doc("counters").unwrap()["cars"], 1);
}

#[tokio::test]
async fn test_write_failure_aborts_migration() {
    let fake = FakeCouch::default();
    let store = bootstrapped_store(&fake).await;
    fake.with(|s| s.fail_writes = true);
    let snapshot = Snapshot {
        railroads: vec![Railroad {
            id: 1,
            name: Some("Erie".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let err = migrate(&snapshot, &store).await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::Store(StoreError::Status { status: 500, .. })
    ));
}
