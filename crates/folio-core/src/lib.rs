//! # Folio Core
//!
//! Backend-agnostic pieces of the Folio data-access layer: document and
//! collection paths, untyped records, query constraints, batched writes,
//! cancellable live subscriptions, and the [`store::DocumentStore`] trait
//! with an in-memory implementation.
//!
//! This crate performs no network I/O. The `folio` crate adds the REST
//! backend, the client registry, and the typed adapter on top.

pub mod batch;
pub mod error;
pub mod path;
pub mod query;
pub mod record;
pub mod store;
pub mod subscription;

pub use batch::{
    batch_delete, batch_set, batch_update, commit_in_chunks, BatchCommitter, BatchOp,
    DEFAULT_CHUNK_SIZE, MAX_BATCH_SIZE,
};
pub use error::{StoreError, StoreResult};
pub use path::{CollectionPath, DocPath};
pub use query::{apply_constraints, sort_docs, Direction, FilterOp, QueryConstraint};
pub use record::{from_record, to_record, RawDoc, Record, SetOptions, WithId};
pub use store::memory::MemoryStore;
pub use store::DocumentStore;
pub use subscription::{DetachHandle, Subscription};
