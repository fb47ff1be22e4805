//! Batched writes and chunked submission.
//!
//! A single [`BatchCommitter::commit_batch`] call is atomic. Backends cap the
//! number of operations per batch, so [`commit_in_chunks`] splits a logical
//! batch into slices and submits them one after another. The logical batch
//! as a whole is **not** atomic: if chunk `k` fails, chunks `0..k` stay
//! committed and the rest are never sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::path::DocPath;
use crate::record::{Record, SetOptions};

/// Default slice size, kept under the backend's 500-operation limit.
pub const DEFAULT_CHUNK_SIZE: usize = 450;

/// Hard limit on operations in one atomic batch.
pub const MAX_BATCH_SIZE: usize = 500;

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchOp {
    Set {
        path: DocPath,
        data: Record,
        #[serde(default)]
        options: SetOptions,
    },
    Update {
        path: DocPath,
        data: Record,
    },
    Delete {
        path: DocPath,
    },
}

impl BatchOp {
    pub fn path(&self) -> &DocPath {
        match self {
            BatchOp::Set { path, .. } | BatchOp::Update { path, .. } | BatchOp::Delete { path } => {
                path
            }
        }
    }
}

pub fn batch_set<I>(items: I) -> Vec<BatchOp>
where
    I: IntoIterator<Item = (DocPath, Record, SetOptions)>,
{
    items
        .into_iter()
        .map(|(path, data, options)| BatchOp::Set {
            path,
            data,
            options,
        })
        .collect()
}

pub fn batch_update<I>(items: I) -> Vec<BatchOp>
where
    I: IntoIterator<Item = (DocPath, Record)>,
{
    items
        .into_iter()
        .map(|(path, data)| BatchOp::Update { path, data })
        .collect()
}

pub fn batch_delete<I>(paths: I) -> Vec<BatchOp>
where
    I: IntoIterator<Item = DocPath>,
{
    paths.into_iter().map(|path| BatchOp::Delete { path }).collect()
}

/// Anything that can apply a batch atomically.
#[async_trait]
pub trait BatchCommitter: Send + Sync {
    async fn commit_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()>;
}

/// Commit `ops` in sequential slices of `chunk_size`.
///
/// Returns the number of chunks committed. On failure the error is wrapped
/// in [`StoreError::PartialCommit`] carrying how many chunks landed before it.
pub async fn commit_in_chunks<C>(
    committer: &C,
    ops: Vec<BatchOp>,
    chunk_size: usize,
) -> StoreResult<usize>
where
    C: BatchCommitter + ?Sized,
{
    if chunk_size == 0 {
        return Err(StoreError::Configuration(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    let total = ops.len().div_ceil(chunk_size);
    let mut remaining = ops.into_iter().peekable();
    let mut committed = 0;

    while remaining.peek().is_some() {
        let chunk: Vec<BatchOp> = remaining.by_ref().take(chunk_size).collect();
        let size = chunk.len();
        if let Err(err) = committer.commit_batch(chunk).await {
            tracing::warn!(committed, total, "chunked commit failed: {}", err);
            return Err(StoreError::PartialCommit {
                committed,
                total,
                source: Box::new(err),
            });
        }
        committed += 1;
        tracing::debug!(chunk = committed, total, size, "committed batch chunk");
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCommitter {
        calls: Mutex<Vec<Vec<BatchOp>>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl BatchCommitter for RecordingCommitter {
        async fn commit_batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_on == Some(calls.len()) {
                return Err(StoreError::Backend("permission denied".to_string()));
            }
            calls.push(ops);
            Ok(())
        }
    }

    fn deletes(n: usize) -> Vec<BatchOp> {
        batch_delete((0..n).map(|i| DocPath::parse(&format!("test/{}", i)).unwrap()))
    }

    #[tokio::test]
    async fn thousand_deletes_split_450_450_100() {
        let committer = RecordingCommitter::default();
        let ops = deletes(1000);
        let n = commit_in_chunks(&committer, ops.clone(), DEFAULT_CHUNK_SIZE)
            .await
            .unwrap();
        assert_eq!(n, 3);

        let calls = committer.calls.lock().unwrap();
        let sizes: Vec<usize> = calls.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![450, 450, 100]);
        assert_eq!(calls[0][..], ops[0..450]);
        assert_eq!(calls[1][..], ops[450..900]);
        assert_eq!(calls[2][..], ops[900..1000]);
    }

    #[tokio::test]
    async fn failure_leaves_earlier_chunks_and_stops() {
        let committer = RecordingCommitter {
            fail_on: Some(1),
            ..Default::default()
        };
        let err = commit_in_chunks(&committer, deletes(10), 4)
            .await
            .unwrap_err();
        match err {
            StoreError::PartialCommit {
                committed, total, ..
            } => {
                assert_eq!(committed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(committer.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_commits_nothing() {
        let committer = RecordingCommitter::default();
        assert_eq!(commit_in_chunks(&committer, vec![], 450).await.unwrap(), 0);
        assert!(committer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected() {
        let committer = RecordingCommitter::default();
        assert!(commit_in_chunks(&committer, deletes(1), 0).await.is_err());
    }

    #[test]
    fn builders_map_items_to_ops() {
        let p1 = DocPath::parse("test/1").unwrap();
        let data = json!({"a": 1}).as_object().cloned().unwrap();
        let ops = batch_set(vec![(p1.clone(), data.clone(), SetOptions::merge())]);
        assert_eq!(
            ops,
            vec![BatchOp::Set {
                path: p1.clone(),
                data: data.clone(),
                options: SetOptions { merge: true },
            }]
        );
        let ops = batch_update(vec![(p1.clone(), data.clone())]);
        assert_eq!(ops[0].path(), &p1);
        assert!(matches!(ops[0], BatchOp::Update { .. }));
    }

    #[test]
    fn op_serializes_with_type_tag() {
        let op = BatchOp::Delete {
            path: DocPath::parse("test/1").unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"type": "delete", "path": "test/1"})
        );
    }
}
