//! Error taxonomy shared by every store implementation.

use thiserror::Error;

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the data-access layer.
///
/// `Configuration` is raised when a handle is requested for a project that
/// is not configured. Everything the backend reports (network failures,
/// permission denials, missing documents on update) arrives as `NotFound`,
/// `Http`, or `Backend`. The layer never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("record must be a JSON object, got {0}")]
    InvalidRecord(String),

    #[error("document '{path}' does not match the expected shape: {source}")]
    Schema {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("chunked commit stopped after {committed} of {total} chunks: {source}")]
    PartialCommit {
        committed: usize,
        total: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl StoreError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the backend reported that the addressed document is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Http { status, .. } => *status == 404,
            StoreError::PartialCommit { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
