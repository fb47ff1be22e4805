//! In-memory [`DocumentStore`] with real-time fan-out.
//!
//! Documents live in a `BTreeMap` behind `std::sync::RwLock`. Listeners are
//! kept in a table keyed by a numeric id; every write computes fresh
//! snapshots for the listeners whose document or collection it touched and
//! pushes them through an unbounded channel. A batch is staged first and
//! applied under one write lock, so listeners see it as a single change.
//!
//! Lock order is always `docs` then `listeners`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::batch::BatchOp;
use crate::error::{StoreError, StoreResult};
use crate::path::{CollectionPath, DocPath};
use crate::query::{apply_constraints, QueryConstraint};
use crate::record::{apply_update, deep_merge, RawDoc, Record, SetOptions, WithId};
use crate::subscription::{SnapshotSender, Subscription};

use super::DocumentStore;

type Docs = BTreeMap<DocPath, Record>;

enum Listener {
    Doc {
        path: DocPath,
        tx: SnapshotSender<Option<RawDoc>>,
    },
    Query {
        collection: CollectionPath,
        constraints: Vec<QueryConstraint>,
        tx: SnapshotSender<Vec<RawDoc>>,
    },
}

impl Listener {
    fn is_affected_by(&self, changed: &BTreeSet<DocPath>) -> bool {
        match self {
            Listener::Doc { path, .. } => changed.contains(path),
            Listener::Query { collection, .. } => changed.iter().any(|p| collection.contains(p)),
        }
    }

    /// Push a fresh snapshot. Returns false when the receiver is gone.
    fn emit(&self, docs: &Docs) -> bool {
        match self {
            Listener::Doc { path, tx } => tx.send(Ok(doc_snapshot(docs, path))).is_ok(),
            Listener::Query {
                collection,
                constraints,
                tx,
            } => tx
                .send(Ok(query_snapshot(docs, collection, constraints)))
                .is_ok(),
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<u64, Listener>,
}

#[derive(Default)]
struct Inner {
    docs: RwLock<Docs>,
    listeners: Mutex<Listeners>,
}

fn doc_snapshot(docs: &Docs, path: &DocPath) -> Option<RawDoc> {
    docs.get(path)
        .map(|data| WithId::new(path.id(), data.clone()))
}

fn collection_docs(docs: &Docs, collection: &CollectionPath) -> Vec<RawDoc> {
    docs.iter()
        .filter(|(path, _)| collection.contains(path))
        .map(|(path, data)| WithId::new(path.id(), data.clone()))
        .collect()
}

fn query_snapshot(
    docs: &Docs,
    collection: &CollectionPath,
    constraints: &[QueryConstraint],
) -> Vec<RawDoc> {
    apply_constraints(collection_docs(docs, collection), constraints)
}

/// In-memory document store. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        self.read_docs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of attached live listeners.
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().entries.len()
    }

    fn read_docs(&self) -> std::sync::RwLockReadGuard<'_, Docs> {
        self.inner
            .docs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_docs(&self) -> std::sync::RwLockWriteGuard<'_, Docs> {
        self.inner
            .docs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        lock_listeners(&self.inner)
    }

    /// Run `mutate` under the write lock, then notify affected listeners
    /// while the lock is still held so notification order matches write order.
    fn write<R>(
        &self,
        mutate: impl FnOnce(&mut Docs) -> StoreResult<(R, BTreeSet<DocPath>)>,
    ) -> StoreResult<R> {
        let mut docs = self.write_docs();
        let (result, changed) = mutate(&mut docs)?;
        if !changed.is_empty() {
            let mut listeners = self.lock_listeners();
            listeners
                .entries
                .retain(|_, listener| !listener.is_affected_by(&changed) || listener.emit(&docs));
        }
        Ok(result)
    }

    /// Attach a listener, sending its first snapshot. Returns the detach hook.
    fn register(&self, listener: Listener) -> impl FnOnce() + Send + 'static {
        let docs = self.read_docs();
        let mut listeners = self.lock_listeners();
        listener.emit(&docs);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, listener);
        tracing::debug!(listener = id, "memory store listener attached");

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                lock_listeners(&inner).entries.remove(&id);
                tracing::debug!(listener = id, "memory store listener detached");
            }
        }
    }
}

fn lock_listeners(inner: &Inner) -> std::sync::MutexGuard<'_, Listeners> {
    inner
        .listeners
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn changed_one(path: &DocPath) -> BTreeSet<DocPath> {
    BTreeSet::from([path.clone()])
}

/// Apply `op` to a staged view of the documents.
fn stage_op(
    docs: &Docs,
    staged: &mut BTreeMap<DocPath, Option<Record>>,
    op: &BatchOp,
) -> StoreResult<()> {
    let path = op.path();
    let current = match staged.get(path) {
        Some(entry) => entry.clone(),
        None => docs.get(path).cloned(),
    };
    let next = match op {
        BatchOp::Set { data, options, .. } => match (current, options.merge) {
            (Some(mut existing), true) => {
                deep_merge(&mut existing, data);
                Some(existing)
            }
            _ => Some(data.clone()),
        },
        BatchOp::Update { data, .. } => {
            let mut existing =
                current.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            apply_update(&mut existing, data);
            Some(existing)
        }
        BatchOp::Delete { .. } => None,
    };
    staged.insert(path.clone(), next);
    Ok(())
}

/// Write staged results back. Deleting an absent document is not a change.
fn apply_staged(docs: &mut Docs, staged: BTreeMap<DocPath, Option<Record>>) -> BTreeSet<DocPath> {
    let mut changed = BTreeSet::new();
    for (path, next) in staged {
        match next {
            Some(data) => {
                docs.insert(path.clone(), data);
                changed.insert(path);
            }
            None => {
                if docs.remove(&path).is_some() {
                    changed.insert(path);
                }
            }
        }
    }
    changed
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Record>> {
        Ok(self.read_docs().get(path).cloned())
    }

    async fn set(&self, path: &DocPath, data: Record, options: SetOptions) -> StoreResult<()> {
        let op = BatchOp::Set {
            path: path.clone(),
            data,
            options,
        };
        self.commit(std::slice::from_ref(&op)).await
    }

    async fn add(&self, collection: &CollectionPath, data: Record) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = collection.doc(&id)?;
        self.write(|docs| {
            docs.insert(path.clone(), data);
            Ok(((), changed_one(&path)))
        })?;
        Ok(id)
    }

    async fn update(&self, path: &DocPath, patch: Record) -> StoreResult<()> {
        self.write(|docs| {
            let existing = docs
                .get_mut(path)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            apply_update(existing, &patch);
            Ok(((), changed_one(path)))
        })
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.write(|docs| {
            let changed = match docs.remove(path) {
                Some(_) => changed_one(path),
                None => BTreeSet::new(),
            };
            Ok(((), changed))
        })
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<RawDoc>> {
        Ok(query_snapshot(&self.read_docs(), collection, &[]))
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> StoreResult<Vec<RawDoc>> {
        Ok(query_snapshot(&self.read_docs(), collection, constraints))
    }

    async fn commit(&self, ops: &[BatchOp]) -> StoreResult<()> {
        self.write(|docs| {
            let mut staged = BTreeMap::new();
            for op in ops {
                stage_op(docs, &mut staged, op)?;
            }
            Ok(((), apply_staged(docs, staged)))
        })
    }

    async fn list_collection_ids(&self) -> StoreResult<Vec<String>> {
        let docs = self.read_docs();
        let ids: BTreeSet<String> = docs
            .keys()
            .filter_map(|path| path.segments().next().map(str::to_string))
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn watch_doc(&self, path: &DocPath) -> Subscription<Option<RawDoc>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let detach = self.register(Listener::Doc {
            path: path.clone(),
            tx,
        });
        Subscription::from_receiver(rx, detach)
    }

    fn watch_query(
        &self,
        collection: &CollectionPath,
        constraints: &[QueryConstraint],
    ) -> Subscription<Vec<RawDoc>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let detach = self.register(Listener::Query {
            collection: collection.clone(),
            constraints: constraints.to_vec(),
            tx,
        });
        Subscription::from_receiver(rx, detach)
    }
}
