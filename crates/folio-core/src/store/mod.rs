//! Storage abstraction for Folio.
//!
//! The [`DocumentStore`] trait is the uniform, path-addressed interface every
//! backend implements: the in-process [`memory::MemoryStore`] and the REST
//! client in the `folio` crate. It works on untyped [`Record`]s; the typed
//! adapter in `folio` layers caller-chosen record types on top.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::batch::{BatchCommitter, BatchOp};
use crate::error::StoreResult;
use crate::path::{CollectionPath, DocPath};
use crate::query::QueryConstraint;
use crate::record::{RawDoc, Record, SetOptions};
use crate::subscription::Subscription;

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](DocumentStore::get) | Read one document, `None` if absent |
/// | [`set`](DocumentStore::set) | Create or overwrite (optionally merge) |
/// | [`add`](DocumentStore::add) | Create with a store-generated id |
/// | [`update`](DocumentStore::update) | Patch fields of an existing document |
/// | [`delete`](DocumentStore::delete) | Remove a document (no-op if absent) |
/// | [`list`](DocumentStore::list) | One-shot listing of a collection |
/// | [`query`](DocumentStore::query) | One-shot filtered/sorted listing |
/// | [`commit`](DocumentStore::commit) | Apply a batch atomically |
/// | [`list_collection_ids`](DocumentStore::list_collection_ids) | Top-level collection names |
/// | [`watch_doc`](DocumentStore::watch_doc) | Live snapshots of one document |
/// | [`watch_query`](DocumentStore::watch_query) | Live snapshots of a query |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Record>>;

    async fn set(&self, path: &DocPath, data: Record, options: SetOptions) -> StoreResult<()>;

    /// Returns the generated document id.
    async fn add(&self, collection: &CollectionPath, data: Record) -> StoreResult<String>;

    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, path: &DocPath, patch: Record) -> StoreResult<()>;

    async fn delete(&self, path: &DocPath) -> StoreResult<()>;

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<RawDoc>>;

    async fn query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> StoreResult<Vec<RawDoc>>;

    /// Apply every op or none of them.
    async fn commit(&self, ops: &[BatchOp]) -> StoreResult<()>;

    async fn list_collection_ids(&self) -> StoreResult<Vec<String>>;

    /// Emits the current snapshot immediately, then again on every change.
    fn watch_doc(&self, path: &DocPath) -> Subscription<Option<RawDoc>>;

    /// Emits the full result set immediately, then again on every change.
    fn watch_query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> Subscription<Vec<RawDoc>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> BatchCommitter for S {
    async fn commit_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        self.commit(&ops).await
    }
}
