//! Typed, path-addressed document operations.
//!
//! A [`DocumentAdapter`] wraps one [`DocumentStore`] and lets callers pick
//! the record type at each call site. Paths are slash-delimited strings
//! (`"test/abc"`); they are validated before any backend call. Every record
//! read back carries its id from the last path segment, outside the payload.
//!
//! # Example
//!
//! ```rust,no_run
//! use folio::config::Config;
//! use folio::registry::{ClientRegistry, Environment};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Note {
//!     message: String,
//!     #[serde(rename = "createdAt")]
//!     created_at: i64,
//! }
//!
//! # async fn example() -> folio::core::StoreResult<()> {
//! let registry = ClientRegistry::from_config(Config::in_memory("demo"))?;
//! let adapter = registry.adapter(None, Environment::Emulator)?;
//! let id = adapter
//!     .add_doc("test", &Note { message: "hello".into(), created_at: 1000 })
//!     .await?;
//! let note = adapter.get_doc::<Note>(&format!("test/{}", id)).await?;
//! assert!(note.is_some());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use folio_core::{
    from_record, to_record, BatchCommitter, BatchOp, CollectionPath, DocPath, DocumentStore,
    QueryConstraint, RawDoc, SetOptions, StoreError, StoreResult, Subscription, WithId,
    DEFAULT_CHUNK_SIZE, MAX_BATCH_SIZE,
};

#[derive(Clone)]
pub struct DocumentAdapter {
    store: Arc<dyn DocumentStore>,
    label: String,
    chunk_size: usize,
}

impl std::fmt::Debug for DocumentAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAdapter")
            .field("label", &self.label)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

fn decode<T: DeserializeOwned>(collection: &CollectionPath, raw: RawDoc) -> StoreResult<WithId<T>> {
    let path = format!("{}/{}", collection, raw.id);
    let data = from_record(&path, raw.data)?;
    Ok(WithId::new(raw.id, data))
}

impl DocumentAdapter {
    pub fn new(store: Arc<dyn DocumentStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Slice size used by [`commit_in_chunks`](Self::commit_in_chunks) when
    /// none is given.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// The client key this adapter was created for, e.g. `demo::emulator`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// `None` if the document does not exist.
    pub async fn get_doc<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<WithId<T>>> {
        let path = DocPath::parse(path)?;
        tracing::debug!(adapter = %self.label, %path, "get_doc");
        match self.store.get(&path).await? {
            Some(record) => {
                let data = from_record(path.as_str(), record)?;
                Ok(Some(WithId::new(path.id(), data)))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the document, or deep-merge into it with `SetOptions::merge()`.
    pub async fn set_doc<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
        options: SetOptions,
    ) -> StoreResult<()> {
        let path = DocPath::parse(path)?;
        tracing::debug!(adapter = %self.label, %path, merge = options.merge, "set_doc");
        self.store.set(&path, to_record(data)?, options).await
    }

    /// Create a document with a backend-assigned id and return the id.
    pub async fn add_doc<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        data: &T,
    ) -> StoreResult<String> {
        let collection = CollectionPath::parse(collection)?;
        tracing::debug!(adapter = %self.label, %collection, "add_doc");
        self.store.add(&collection, to_record(data)?).await
    }

    /// Patch the given fields. Keys may be dotted paths into nested maps.
    pub async fn update_doc<T: Serialize + ?Sized>(
        &self,
        path: &str,
        patch: &T,
    ) -> StoreResult<()> {
        let path = DocPath::parse(path)?;
        tracing::debug!(adapter = %self.label, %path, "update_doc");
        self.store.update(&path, to_record(patch)?).await
    }

    pub async fn delete_doc(&self, path: &str) -> StoreResult<()> {
        let path = DocPath::parse(path)?;
        tracing::debug!(adapter = %self.label, %path, "delete_doc");
        self.store.delete(&path).await
    }

    pub async fn list_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> StoreResult<Vec<WithId<T>>> {
        let collection = CollectionPath::parse(collection)?;
        tracing::debug!(adapter = %self.label, %collection, "list_collection");
        self.store
            .list(&collection)
            .await?
            .into_iter()
            .map(|raw| decode(&collection, raw))
            .collect()
    }

    pub async fn query_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        constraints: &[QueryConstraint],
    ) -> StoreResult<Vec<WithId<T>>> {
        let collection = CollectionPath::parse(collection)?;
        tracing::debug!(adapter = %self.label, %collection, "query_collection");
        self.store
            .query(&collection, constraints)
            .await?
            .into_iter()
            .map(|raw| decode(&collection, raw))
            .collect()
    }

    pub async fn list_collection_ids(&self) -> StoreResult<Vec<String>> {
        self.store.list_collection_ids().await
    }

    /// Apply `ops` atomically. Larger batches than the backend accepts are
    /// rejected before anything is sent.
    pub async fn commit_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        if ops.len() > MAX_BATCH_SIZE {
            return Err(StoreError::BatchTooLarge {
                size: ops.len(),
                limit: MAX_BATCH_SIZE,
            });
        }
        tracing::debug!(adapter = %self.label, ops = ops.len(), "commit_batch");
        self.store.commit(&ops).await
    }

    /// Submit `ops` as sequential batches. Atomic per chunk only.
    pub async fn commit_in_chunks(
        &self,
        ops: Vec<BatchOp>,
        chunk_size: Option<usize>,
    ) -> StoreResult<usize> {
        folio_core::commit_in_chunks(self, ops, chunk_size.unwrap_or(self.chunk_size)).await
    }

    /// Live snapshots of one document; `None` while it does not exist.
    pub fn listen_doc<T>(&self, path: &str) -> Subscription<Option<WithId<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = match DocPath::parse(path) {
            Ok(path) => path,
            Err(err) => return Subscription::failed(err),
        };
        let collection = path.parent();
        self.store
            .watch_doc(&path)
            .map(move |snapshot| snapshot.map(|raw| decode(&collection, raw)).transpose())
    }

    /// Live result sets of a collection query, re-emitted in full on every change.
    pub fn listen_collection<T>(
        &self,
        collection: &str,
        constraints: &[QueryConstraint],
    ) -> Subscription<Vec<WithId<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let collection = match CollectionPath::parse(collection) {
            Ok(collection) => collection,
            Err(err) => return Subscription::failed(err),
        };
        let decode_path = collection.clone();
        self.store
            .watch_query(&collection, constraints)
            .map(move |docs| {
                docs.into_iter()
                    .map(|raw| decode(&decode_path, raw))
                    .collect()
            })
    }
}

#[async_trait]
impl BatchCommitter for DocumentAdapter {
    async fn commit_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        DocumentAdapter::commit_batch(self, ops).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{batch_delete, MemoryStore};
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        message: String,
        #[serde(rename = "createdAt")]
        created_at: i64,
    }

    fn adapter() -> DocumentAdapter {
        DocumentAdapter::new(Arc::new(MemoryStore::new()), "test::memory")
    }

    #[tokio::test]
    async fn invalid_paths_fail_before_the_store() {
        let adapter = adapter();
        assert!(matches!(
            adapter.get_doc::<Value>("test").await,
            Err(StoreError::InvalidPath { .. })
        ));
        assert!(adapter.add_doc("test/1", &json!({})).await.is_err());
        assert!(adapter.delete_doc("").await.is_err());
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let adapter = adapter();
        assert!(matches!(
            adapter.set_doc("test/1", &42, SetOptions::default()).await,
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn stored_payload_never_contains_id() {
        let adapter = adapter();
        let id = adapter
            .add_doc("test", &Note { message: "hi".into(), created_at: 1 })
            .await
            .unwrap();
        let raw = adapter.get_doc::<Value>(&format!("test/{}", id)).await.unwrap().unwrap();
        assert_eq!(raw.id, id);
        assert!(raw.data.get("id").is_none());
        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!({"id": id, "message": "hi", "createdAt": 1})
        );
    }

    #[tokio::test]
    async fn schema_mismatch_names_the_path() {
        let adapter = adapter();
        adapter
            .set_doc("test/bad", &json!({"message": 5}), SetOptions::default())
            .await
            .unwrap();
        match adapter.get_doc::<Note>("test/bad").await {
            Err(StoreError::Schema { path, .. }) => assert_eq!(path, "test/bad"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(adapter.list_collection::<Note>("test").await.is_err());
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_and_chunks_are_not() {
        let adapter = adapter();
        let ops = batch_delete((0..501).map(|i| DocPath::parse(&format!("test/{}", i)).unwrap()));
        assert!(matches!(
            adapter.commit_batch(ops.clone()).await,
            Err(StoreError::BatchTooLarge { size: 501, limit: 500 })
        ));
        assert_eq!(adapter.commit_in_chunks(ops, None).await.unwrap(), 2);
    }
}
