//! Collection-bound live view.
//!
//! A [`CollectionView`] keeps the latest result set of a collection listener
//! in a `tokio::sync::watch` cell and offers `add`/`update`/`remove` that
//! write through the adapter. Writes are not applied locally; the cell
//! changes only when the backend emits.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use folio_core::{
    CollectionPath, DetachHandle, QueryConstraint, SetOptions, StoreResult, WithId,
};

use crate::adapter::DocumentAdapter;

pub struct CollectionView<T> {
    adapter: DocumentAdapter,
    collection: CollectionPath,
    rx: watch::Receiver<Vec<WithId<T>>>,
    detach: DetachHandle,
    task: JoinHandle<()>,
}

impl<T> CollectionView<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Start listening to `collection`. Must be called inside a tokio runtime.
    pub fn new(
        adapter: DocumentAdapter,
        collection: &str,
        constraints: &[QueryConstraint],
        initial: Vec<WithId<T>>,
    ) -> StoreResult<Self> {
        let collection = CollectionPath::parse(collection)?;
        let mut subscription = adapter.listen_collection::<T>(collection.as_str(), constraints);
        let detach = subscription.detach_handle();
        let (tx, rx) = watch::channel(initial);

        let label = format!("{}:{}", adapter.label(), collection);
        let task = tokio::spawn(async move {
            while let Some(item) = subscription.recv().await {
                match item {
                    Ok(docs) => {
                        if tx.send(docs).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(view = %label, "collection listener failed: {}", err);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            adapter,
            collection,
            rx,
            detach,
            task,
        })
    }

    /// Wait for the next emission. Returns `false` once the feed has ended.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// A further receiver on the same cell.
    pub fn receiver(&self) -> watch::Receiver<Vec<WithId<T>>> {
        self.rx.clone()
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Write `doc` under a fresh UUID v4 id and return the id.
    pub async fn add<D: Serialize + ?Sized>(&self, doc: &D) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let path = self.collection.doc(&id)?;
        self.adapter
            .set_doc(path.as_str(), doc, SetOptions::default())
            .await?;
        Ok(id)
    }

    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> StoreResult<()> {
        let path = self.collection.doc(id)?;
        self.adapter.update_doc(path.as_str(), patch).await
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let path = self.collection.doc(id)?;
        self.adapter.delete_doc(path.as_str()).await
    }
}

impl<T> CollectionView<T> {
    /// Detach the listener and stop the feed. The last value stays readable.
    pub fn close(&self) {
        self.detach.detach();
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.detach.is_detached() && !self.task.is_finished()
    }
}

impl<T: Clone> CollectionView<T> {
    /// The current snapshot.
    pub fn docs(&self) -> Vec<WithId<T>> {
        self.rx.borrow().clone()
    }
}

impl<T> Drop for CollectionView<T> {
    fn drop(&mut self) {
        self.close();
    }
}
