//! Firestore v1 REST backend.
//!
//! [`RestProvider`] creates one [`RestStore`] and one
//! [`RestAuthClient`](auth::RestAuthClient) per app. A store talks to the
//! hosted service (`https://firestore.googleapis.com`, authenticated with the
//! project's API key) until it is connected to an emulator, after which it
//! talks to `http://{host}:{port}` with the emulator's owner token.
//!
//! # Protocol mapping
//!
//! | Operation | Request |
//! |-----------|---------|
//! | get | `GET {documents}/{path}` (404 → `None`) |
//! | add | `POST {documents}/{collection}` |
//! | set / update / delete / batch | `POST {database}/documents:commit` |
//! | list | `GET {documents}/{collection}?pageSize=&pageToken=` |
//! | query | `POST {parent}:runQuery` |
//! | collection ids | `POST {documents}:listCollectionIds` |
//!
//! Live queries poll at the configured interval and emit whenever the
//! snapshot differs from the previous one. The first snapshot always emits.

pub mod auth;
pub mod value;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

use folio_core::record::{apply_update, leaf_field_paths};
use folio_core::{
    BatchOp, CollectionPath, Direction, DocPath, DocumentStore, FilterOp, QueryConstraint, RawDoc,
    Record, SetOptions, StoreError, StoreResult, Subscription, WithId,
};

use crate::config::{Endpoint, ProjectConfig, StoreConfig};
use crate::provider::{AppHandle, AuthClient, BackendProvider, Instances, StoreClient};

use self::auth::RestAuthClient;
use self::value::{decode_fields, encode_field_path, encode_fields, encode_value};

const LIVE_BASE: &str = "https://firestore.googleapis.com";
const PAGE_SIZE: usize = 300;

/// Timeouts and polling cadence shared by every client of a provider.
#[derive(Debug, Clone)]
pub struct RestOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&StoreConfig> for RestOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

pub struct RestProvider {
    http: reqwest::Client,
    options: RestOptions,
    instances: Instances,
}

impl RestProvider {
    pub fn new(options: RestOptions) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            options,
            instances: Instances::new(),
        })
    }
}

impl BackendProvider for RestProvider {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn get_app(&self, name: &str) -> Option<Arc<AppHandle>> {
        self.instances.get_app(name)
    }

    fn initialize_app(&self, name: &str, project: &ProjectConfig) -> StoreResult<Arc<AppHandle>> {
        self.instances.initialize_app(name, project)
    }

    fn store(&self, app: &AppHandle) -> StoreResult<Arc<dyn StoreClient>> {
        self.instances.store_or_init(app, || {
            Ok(Arc::new(RestStore::new(
                self.http.clone(),
                app.project.clone(),
                self.options.poll_interval,
            )))
        })
    }

    fn auth(&self, app: &AppHandle) -> StoreResult<Arc<dyn AuthClient>> {
        self.instances.auth_or_init(app, || {
            Ok(Arc::new(RestAuthClient::new(
                self.http.clone(),
                app.project.api_key.clone(),
            )))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Live,
    Emulator(Endpoint),
}

struct RestInner {
    http: reqwest::Client,
    project: ProjectConfig,
    target: RwLock<Target>,
    used: AtomicBool,
    poll_interval: Duration,
}

/// Document store speaking the Firestore v1 REST protocol.
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestInner>,
}

/// Turn a response into JSON, mapping error statuses onto [`StoreError`].
pub(crate) async fn read_json(
    response: Result<reqwest::Response, reqwest::Error>,
    what: &str,
) -> StoreResult<Value> {
    let response = response.map_err(|e| StoreError::Backend(format!("{}: {}", what, e)))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| StoreError::Backend(format!("{}: {}", what, e)))?;

    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&text)?);
    }

    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.to_string());

    if status == StatusCode::NOT_FOUND {
        Err(StoreError::NotFound(format!("{}: {}", what, message)))
    } else {
        Err(StoreError::Http {
            status: status.as_u16(),
            message: format!("{}: {}", what, message),
        })
    }
}

fn decode_document(doc: &Value) -> StoreResult<RawDoc> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Backend("document without a name in response".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name);
    Ok(WithId::new(id, decode_fields(doc.get("fields"))?))
}

fn filter_op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "EQUAL",
        FilterOp::NotEqual => "NOT_EQUAL",
        FilterOp::LessThan => "LESS_THAN",
        FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        FilterOp::GreaterThan => "GREATER_THAN",
        FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::In => "IN",
    }
}

fn field_reference(field: &str) -> Value {
    let segments: Vec<&str> = field.split('.').collect();
    json!({ "fieldPath": encode_field_path(&segments) })
}

/// Build the `structuredQuery` body for a collection query.
fn structured_query(collection_id: &str, constraints: &[QueryConstraint]) -> Value {
    let mut filters = Vec::new();
    let mut order_by = Vec::new();
    let mut limit = None;

    for constraint in constraints {
        match constraint {
            QueryConstraint::Where { field, op, value } => filters.push(json!({
                "fieldFilter": {
                    "field": field_reference(field),
                    "op": filter_op_name(*op),
                    "value": encode_value(value),
                }
            })),
            QueryConstraint::OrderBy { field, direction } => {
                let direction = match direction {
                    Direction::Asc => "ASCENDING",
                    Direction::Desc => "DESCENDING",
                };
                order_by.push(json!({
                    "field": field_reference(field),
                    "direction": direction,
                }));
            }
            QueryConstraint::Limit { count } => limit = Some(*count),
        }
    }

    let mut query = json!({ "from": [{ "collectionId": collection_id }] });
    match filters.len() {
        0 => {}
        1 => query["where"] = filters.remove(0),
        _ => {
            query["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } });
        }
    }
    if !order_by.is_empty() {
        query["orderBy"] = Value::Array(order_by);
    }
    if let Some(limit) = limit {
        query["limit"] = json!(limit);
    }
    query
}

impl RestStore {
    pub fn new(http: reqwest::Client, project: ProjectConfig, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RestInner {
                http,
                project,
                target: RwLock::new(Target::Live),
                used: AtomicBool::new(false),
                poll_interval,
            }),
        }
    }

    fn target(&self) -> Target {
        self.inner
            .target
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn database_name(&self) -> String {
        format!(
            "projects/{}/databases/(default)",
            self.inner.project.project_id
        )
    }

    fn documents_name(&self) -> String {
        format!("{}/documents", self.database_name())
    }

    fn doc_name(&self, path: &DocPath) -> String {
        format!("{}/{}", self.documents_name(), path)
    }

    /// Absolute URL of a resource under the current target.
    fn url(&self, resource: &str) -> String {
        let base = match self.target() {
            Target::Live => LIVE_BASE.to_string(),
            Target::Emulator(endpoint) => endpoint.url(),
        };
        format!("{}/v1/{}", base, resource)
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        self.inner.used.store(true, Ordering::SeqCst);
        let builder = self.inner.http.request(method, self.url(resource));
        match self.target() {
            Target::Emulator(_) => builder.bearer_auth("owner"),
            Target::Live if self.inner.project.api_key.is_empty() => builder,
            Target::Live => builder.query(&[("key", self.inner.project.api_key.as_str())]),
        }
    }

    fn encode_write(&self, op: &BatchOp) -> Value {
        match op {
            BatchOp::Set {
                path,
                data,
                options,
            } => {
                let mut write = json!({
                    "update": { "name": self.doc_name(path), "fields": encode_fields(data) }
                });
                if options.merge {
                    let mask: Vec<String> = leaf_field_paths(data)
                        .iter()
                        .map(|segments| encode_field_path(segments))
                        .collect();
                    write["updateMask"] = json!({ "fieldPaths": mask });
                }
                write
            }
            BatchOp::Update { path, data } => {
                let mut expanded = Record::new();
                apply_update(&mut expanded, data);
                let mask: Vec<String> = data
                    .keys()
                    .map(|key| encode_field_path(&key.split('.').collect::<Vec<_>>()))
                    .collect();
                json!({
                    "update": { "name": self.doc_name(path), "fields": encode_fields(&expanded) },
                    "updateMask": { "fieldPaths": mask },
                    "currentDocument": { "exists": true },
                })
            }
            BatchOp::Delete { path } => json!({ "delete": self.doc_name(path) }),
        }
    }

    /// Spawn a polling task that emits `fetch()` results when they change.
    fn poll<T, F, Fut>(&self, what: String, fetch: F) -> Subscription<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                return Subscription::failed(StoreError::Backend(
                    "live queries need a running tokio runtime".to_string(),
                ))
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let interval = self.inner.poll_interval;
        let task = runtime.spawn(async move {
            let mut last: Option<T> = None;
            loop {
                match fetch().await {
                    Ok(snapshot) => {
                        if last.as_ref() != Some(&snapshot) {
                            if tx.send(Ok(snapshot.clone())).is_err() {
                                break;
                            }
                            last = Some(snapshot);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(resource = %what, "live poll failed: {}", err);
                        let _ = tx.send(Err(err));
                        break;
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tx.closed() => break,
                }
            }
        });
        Subscription::from_receiver(rx, move || task.abort())
    }
}

impl StoreClient for RestStore {
    fn connect_emulator(&self, endpoint: &Endpoint) -> StoreResult<()> {
        if self.inner.used.load(Ordering::SeqCst) {
            return Err(StoreError::Configuration(
                "store has already issued requests; connect the emulator before first use"
                    .to_string(),
            ));
        }
        let mut target = self
            .inner
            .target
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Target::Emulator(existing) = &*target {
            return Err(StoreError::Configuration(format!(
                "store already connected to emulator at {}",
                existing.url()
            )));
        }
        *target = Target::Emulator(endpoint.clone());
        Ok(())
    }

    fn emulator_endpoint(&self) -> Option<Endpoint> {
        match self.target() {
            Target::Emulator(endpoint) => Some(endpoint),
            Target::Live => None,
        }
    }

    fn document_store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Record>> {
        tracing::debug!(%path, "rest get");
        let response = self.request(Method::GET, &self.doc_name(path)).send().await;
        match read_json(response, "get document").await {
            Ok(doc) => Ok(Some(decode_document(&doc)?.data)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set(&self, path: &DocPath, data: Record, options: SetOptions) -> StoreResult<()> {
        self.commit(&[BatchOp::Set {
            path: path.clone(),
            data,
            options,
        }])
        .await
    }

    async fn add(&self, collection: &CollectionPath, data: Record) -> StoreResult<String> {
        tracing::debug!(%collection, "rest add");
        let resource = format!("{}/{}", self.documents_name(), collection);
        let response = self
            .request(Method::POST, &resource)
            .json(&json!({ "fields": encode_fields(&data) }))
            .send()
            .await;
        let doc = read_json(response, "create document").await?;
        Ok(decode_document(&doc)?.id)
    }

    async fn update(&self, path: &DocPath, patch: Record) -> StoreResult<()> {
        self.commit(&[BatchOp::Update {
            path: path.clone(),
            data: patch,
        }])
        .await
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.commit(&[BatchOp::Delete { path: path.clone() }]).await
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<RawDoc>> {
        tracing::debug!(%collection, "rest list");
        let resource = format!("{}/{}", self.documents_name(), collection);
        let mut docs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut builder = self
                .request(Method::GET, &resource)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }
            let page = read_json(builder.send().await, "list documents").await?;
            if let Some(items) = page.get("documents").and_then(Value::as_array) {
                for item in items {
                    docs.push(decode_document(item)?);
                }
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(docs);
            }
        }
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> StoreResult<Vec<RawDoc>> {
        if constraints.is_empty() {
            return self.list(collection).await;
        }
        tracing::debug!(%collection, constraints = constraints.len(), "rest query");
        let parent = match collection.parent() {
            Some(doc) => self.doc_name(&doc),
            None => self.documents_name(),
        };
        let body = json!({ "structuredQuery": structured_query(collection.id(), constraints) });
        let response = self
            .request(Method::POST, &format!("{}:runQuery", parent))
            .json(&body)
            .send()
            .await;
        let results = read_json(response, "run query").await?;
        results
            .as_array()
            .map(|rows| rows.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn commit(&self, ops: &[BatchOp]) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        tracing::debug!(writes = ops.len(), "rest commit");
        let writes: Vec<Value> = ops.iter().map(|op| self.encode_write(op)).collect();
        let response = self
            .request(
                Method::POST,
                &format!("{}/documents:commit", self.database_name()),
            )
            .json(&json!({ "writes": writes }))
            .send()
            .await;
        read_json(response, "commit").await?;
        Ok(())
    }

    async fn list_collection_ids(&self) -> StoreResult<Vec<String>> {
        let resource = format!("{}:listCollectionIds", self.documents_name());
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "pageSize": PAGE_SIZE });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let response = self.request(Method::POST, &resource).json(&body).send().await;
            let page = read_json(response, "list collection ids").await?;
            if let Some(items) = page.get("collectionIds").and_then(Value::as_array) {
                ids.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                ids.sort();
                return Ok(ids);
            }
        }
    }

    fn watch_doc(&self, path: &DocPath) -> Subscription<Option<RawDoc>> {
        let store = self.clone();
        let path = path.clone();
        self.poll(path.to_string(), move || {
            let store = store.clone();
            let path = path.clone();
            async move {
                let data = store.get(&path).await?;
                Ok(data.map(|data| WithId::new(path.id(), data)))
            }
        })
    }

    fn watch_query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> Subscription<Vec<RawDoc>> {
        let store = self.clone();
        let collection = collection.clone();
        let constraints = constraints.to_vec();
        self.poll(collection.to_string(), move || {
            let store = store.clone();
            let collection = collection.clone();
            let constraints = constraints.clone();
            async move { store.query(&collection, &constraints).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, Uri},
        routing::get,
        Json, Router,
    };
    use std::sync::Mutex;

    fn project() -> ProjectConfig {
        ProjectConfig {
            api_key: "k123".to_string(),
            auth_domain: String::new(),
            project_id: "demo".to_string(),
            storage_bucket: String::new(),
            messaging_sender_id: String::new(),
            app_id: String::new(),
            measurement_id: None,
        }
    }

    fn store() -> RestStore {
        RestStore::new(reqwest::Client::new(), project(), Duration::from_millis(20))
    }

    fn doc(p: &str) -> DocPath {
        DocPath::parse(p).unwrap()
    }

    #[test]
    fn urls_follow_target() {
        let store = store();
        assert_eq!(
            store.url(&store.doc_name(&doc("test/1"))),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/test/1"
        );
        store
            .connect_emulator(&Endpoint::new("localhost", 8080))
            .unwrap();
        assert_eq!(
            store.url(&store.documents_name()),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );
        assert!(store
            .connect_emulator(&Endpoint::new("localhost", 8080))
            .is_err());
    }

    #[test]
    fn connecting_after_first_request_fails() {
        let store = store();
        let _ = store.request(Method::GET, "x");
        assert!(store
            .connect_emulator(&Endpoint::new("localhost", 8080))
            .is_err());
        assert!(store.emulator_endpoint().is_none());
    }

    #[test]
    fn update_write_has_mask_and_precondition() {
        let store = store();
        let patch = json!({"message": "x", "meta.count": 2})
            .as_object()
            .cloned()
            .unwrap();
        let write = store.encode_write(&BatchOp::Update {
            path: doc("test/1"),
            data: patch,
        });
        assert_eq!(write["currentDocument"], json!({"exists": true}));
        assert_eq!(
            write["updateMask"]["fieldPaths"],
            json!(["message", "meta.count"])
        );
        assert_eq!(
            write["update"]["fields"]["meta"],
            json!({"mapValue": {"fields": {"count": {"integerValue": "2"}}}})
        );
    }

    #[test]
    fn plain_set_has_no_mask_and_merge_does() {
        let store = store();
        let data = json!({"a": {"b": 1}}).as_object().cloned().unwrap();
        let plain = store.encode_write(&BatchOp::Set {
            path: doc("test/1"),
            data: data.clone(),
            options: SetOptions::default(),
        });
        assert!(plain.get("updateMask").is_none());
        let merged = store.encode_write(&BatchOp::Set {
            path: doc("test/1"),
            data,
            options: SetOptions::merge(),
        });
        assert_eq!(merged["updateMask"]["fieldPaths"], json!(["a.b"]));
    }

    #[test]
    fn structured_query_combines_filters() {
        let q = structured_query(
            "test",
            &[
                QueryConstraint::filter("visible", FilterOp::Equal, true),
                QueryConstraint::filter("n", FilterOp::GreaterThan, 1),
                QueryConstraint::order_by("n", Direction::Desc),
                QueryConstraint::limit(5),
            ],
        );
        assert_eq!(q["from"], json!([{"collectionId": "test"}]));
        assert_eq!(q["where"]["compositeFilter"]["op"], "AND");
        assert_eq!(
            q["where"]["compositeFilter"]["filters"][1]["fieldFilter"]["op"],
            "GREATER_THAN"
        );
        assert_eq!(q["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(q["limit"], 5);

        let single = structured_query(
            "test",
            &[QueryConstraint::filter("a", FilterOp::In, json!([1]))],
        );
        assert_eq!(single["where"]["fieldFilter"]["op"], "IN");
    }

    #[derive(Clone, Default)]
    struct Seen {
        requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    async fn handle_get(
        State(seen): State<Seen>,
        uri: Uri,
        headers: HeaderMap,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.requests
            .lock()
            .unwrap()
            .push((uri.path().to_string(), auth, Value::Null));
        if uri.path().ends_with("/test/1") {
            Json(json!({
                "name": "projects/demo/databases/(default)/documents/test/1",
                "fields": {
                    "message": {"stringValue": "hello"},
                    "createdAt": {"integerValue": "1000"}
                }
            }))
            .into_response()
        } else {
            (
                axum::http::StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": 404, "message": "no doc", "status": "NOT_FOUND"}})),
            )
                .into_response()
        }
    }

    async fn handle_post(
        State(seen): State<Seen>,
        uri: Uri,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        seen.requests
            .lock()
            .unwrap()
            .push((uri.path().to_string(), None, body));
        Json(json!({"writeResults": [], "commitTime": "2024-01-01T00:00:00Z"}))
    }

    async fn spawn_mock() -> (Endpoint, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/v1/{*rest}", get(handle_get).post(handle_post))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (Endpoint::new("127.0.0.1", port), seen)
    }

    #[tokio::test]
    async fn emulator_requests_round_trip() {
        let (endpoint, seen) = spawn_mock().await;
        let store = store();
        store.connect_emulator(&endpoint).unwrap();

        let found = store.get(&doc("test/1")).await.unwrap().unwrap();
        assert_eq!(found["message"], "hello");
        assert_eq!(found["createdAt"], 1000);
        assert!(store.get(&doc("test/2")).await.unwrap().is_none());

        store.delete(&doc("test/1")).await.unwrap();

        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests[0].1.as_deref(), Some("Bearer owner"));
        let (path, _, body) = &requests[2];
        assert_eq!(path, "/v1/projects/demo/databases/(default)/documents:commit");
        assert_eq!(
            body["writes"][0]["delete"],
            "projects/demo/databases/(default)/documents/test/1"
        );
    }

    #[tokio::test]
    async fn watch_doc_polls_until_unsubscribed() {
        let (endpoint, seen) = spawn_mock().await;
        let store = store();
        store.connect_emulator(&endpoint).unwrap();

        let mut sub = store.watch_doc(&doc("test/1"));
        let first = sub.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(first.id, "1");

        tokio::time::sleep(Duration::from_millis(80)).await;
        sub.unsubscribe();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let polled = seen.requests.lock().unwrap().len();
        assert!(polled >= 2);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(seen.requests.lock().unwrap().len(), polled);
    }
}
