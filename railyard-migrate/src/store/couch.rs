//! CouchDB HTTP client
//!
//! Layout written into the target database, shared with the web application:
//! - `<type>:<n>` documents carrying `type` and numeric `id`
//! - `counters`: next-id counter per table, plus `<table>_total` when present
//! - `_design/indexes`: the `by_type_id` view used for paging
//! - `schema_version`

use async_trait::async_trait;
use railyard_common::config::CouchConfig;
use railyard_common::models::SourceTable;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{document_body, DocId, DocumentStore, Fields, StoreError};

const USER_AGENT: &str = concat!("railyard/", env!("CARGO_PKG_VERSION"));
const COUNTERS_ID: &str = "counters";
const SCHEMA_VERSION_ID: &str = "schema_version";
const DESIGN_ID: &str = "_design/indexes";
const BY_TYPE_ID_MAP: &str = "function(doc) { if (doc.type && doc.id !== undefined && doc.id !== null) { emit([doc.type, doc.id], null); }}";

/// Response body of a successful document PUT
#[derive(Debug, Deserialize)]
struct PutResponse {
    rev: String,
}

/// CouchDB client bound to one database
pub struct CouchStore {
    http_client: reqwest::Client,
    base_url: Url,
    database: String,
    credentials: Option<(String, String)>,
}

impl CouchStore {
    /// Build a client; credentials embedded in the URL become basic auth
    pub fn new(config: &CouchConfig) -> Result<Self, StoreError> {
        let invalid = |message: String| StoreError::InvalidUrl {
            url: redact(&config.url),
            message,
        };

        let mut base_url = Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        if config.database.trim().is_empty() {
            return Err(invalid("database name is empty".to_string()));
        }

        let credentials = if base_url.username().is_empty() {
            None
        } else {
            Some((
                base_url.username().to_string(),
                base_url.password().unwrap_or_default().to_string(),
            ))
        };
        base_url
            .set_username("")
            .and_then(|_| base_url.set_password(None))
            .map_err(|_| invalid("cannot strip credentials".to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            database: config.database.clone(),
            credentials,
        })
    }

    /// Server URL without credentials, for logging
    pub fn display_url(&self) -> String {
        format!("{}{}", self.base_url, self.database)
    }

    /// Prepare the target database the way the web application expects it
    pub async fn bootstrap(&self, schema_version: &str) -> Result<(), StoreError> {
        self.ensure_database().await?;
        self.ensure_views().await?;
        self.ensure_counters().await?;
        self.ensure_schema_version(schema_version).await?;
        info!("✓ Target database ready: {}", self.display_url());
        Ok(())
    }

    async fn ensure_database(&self) -> Result<(), StoreError> {
        let url = self.url(&[])?;
        let response = self.request(Method::PUT, url).send().await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!("Created database {}", self.database);
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => {
                debug!("Database {} already exists", self.database);
                Ok(())
            }
            status => Err(status_error("PUT", &self.database, status, response).await),
        }
    }

    async fn ensure_views(&self) -> Result<(), StoreError> {
        let views = json!({ "by_type_id": { "map": BY_TYPE_ID_MAP } });
        match self.get_doc(DESIGN_ID).await? {
            None => {
                self.put_doc(DESIGN_ID, &json!({ "_id": DESIGN_ID, "views": views }))
                    .await?;
            }
            Some(mut existing) => {
                if existing["views"]["by_type_id"]["map"] != BY_TYPE_ID_MAP {
                    object_mut(&mut existing, DESIGN_ID)?.insert("views".to_string(), views);
                    self.put_doc(DESIGN_ID, &existing).await?;
                }
            }
        }
        Ok(())
    }

    async fn ensure_counters(&self) -> Result<(), StoreError> {
        match self.get_doc(COUNTERS_ID).await? {
            None => {
                let mut doc = json!({ "_id": COUNTERS_ID, "type": "counters" });
                let fields = object_mut(&mut doc, COUNTERS_ID)?;
                for table in SourceTable::ALL {
                    fields.insert(table.counter_key().to_string(), json!(0));
                }
                self.put_doc(COUNTERS_ID, &doc).await?;
            }
            Some(mut doc) => {
                let fields = object_mut(&mut doc, COUNTERS_ID)?;
                let mut updated = false;
                for table in SourceTable::ALL {
                    if !fields.contains_key(table.counter_key()) {
                        fields.insert(table.counter_key().to_string(), json!(0));
                        updated = true;
                    }
                }
                if updated {
                    self.put_doc(COUNTERS_ID, &doc).await?;
                }
            }
        }
        Ok(())
    }

    async fn ensure_schema_version(&self, version: &str) -> Result<(), StoreError> {
        match self.get_doc(SCHEMA_VERSION_ID).await? {
            None => {
                let doc = json!({
                    "_id": SCHEMA_VERSION_ID,
                    "type": "schema_version",
                    "version": version,
                });
                self.put_doc(SCHEMA_VERSION_ID, &doc).await?;
            }
            Some(mut doc) => {
                if doc["version"] != version {
                    info!("Updating schema version {} -> {}", doc["version"], version);
                    object_mut(&mut doc, SCHEMA_VERSION_ID)?
                        .insert("version".to_string(), json!(version));
                    self.put_doc(SCHEMA_VERSION_ID, &doc).await?;
                }
            }
        }
        Ok(())
    }

    /// Allocate the next id for `table`
    ///
    /// Bumps the table's counter (and its `_total`, when the application keeps
    /// one) with optimistic concurrency, retrying on 409.
    pub async fn next_id(&self, table: SourceTable) -> Result<i64, StoreError> {
        let key = table.counter_key();
        let total_key = format!("{}_total", key);
        loop {
            let mut doc = self
                .get_doc(COUNTERS_ID)
                .await?
                .ok_or_else(|| StoreError::NotFound(COUNTERS_ID.to_string()))?;
            let fields = object_mut(&mut doc, COUNTERS_ID)?;

            let next = fields.get(key).and_then(Value::as_i64).unwrap_or(0) + 1;
            fields.insert(key.to_string(), json!(next));
            if let Some(total) = fields.get(&total_key).and_then(Value::as_i64) {
                fields.insert(total_key.clone(), json!(total + 1));
            }

            match self.put_doc(COUNTERS_ID, &doc).await {
                Ok(_) => return Ok(next),
                Err(StoreError::Conflict(_)) => {
                    debug!("Counter conflict on {}, retrying", key);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch a document; `None` when it does not exist
    pub async fn get_doc(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let url = self.doc_url(id)?;
        let response = self.request(Method::GET, url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(status_error("GET", id, status, response).await),
        }
    }

    /// Write a document, returning its new revision
    pub async fn put_doc(&self, id: &str, doc: &Value) -> Result<String, StoreError> {
        let url = self.doc_url(id)?;
        debug!("PUT {}", id);
        let response = self.request(Method::PUT, url).json(doc).send().await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let body: PutResponse = response.json().await?;
                Ok(body.rev)
            }
            StatusCode::CONFLICT => Err(StoreError::Conflict(id.to_string())),
            status => Err(status_error("PUT", id, status, response).await),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    fn doc_url(&self, id: &str) -> Result<Url, StoreError> {
        match id.strip_prefix("_design/") {
            Some(name) => self.url(&["_design", name]),
            None => self.url(&[id]),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Protocol("server URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&self.database)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for CouchStore {
    async fn create(&self, table: SourceTable, fields: Fields) -> Result<DocId, StoreError> {
        let id = DocId::new(table, self.next_id(table).await?);
        self.put_doc(&id.to_string(), &document_body(&id, fields))
            .await?;
        Ok(id)
    }

    /// Read-merge-write; a concurrent edit surfaces as `Conflict`
    async fn patch(&self, id: &DocId, fields: Fields) -> Result<(), StoreError> {
        let doc_id = id.to_string();
        let mut doc = self
            .get_doc(&doc_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(doc_id.clone()))?;
        object_mut(&mut doc, &doc_id)?.extend(fields);
        self.put_doc(&doc_id, &doc).await?;
        Ok(())
    }
}

fn object_mut<'a>(doc: &'a mut Value, id: &str) -> Result<&'a mut Fields, StoreError> {
    doc.as_object_mut()
        .ok_or_else(|| StoreError::Protocol(format!("{} is not a JSON object", id)))
}

async fn status_error(
    method: &str,
    path: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> StoreError {
    let body = response.text().await.unwrap_or_default();
    StoreError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status: status.as_u16(),
        body,
    }
}

/// Hide a password embedded in a URL
fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
