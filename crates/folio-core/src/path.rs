//! Slash-delimited document and collection paths.
//!
//! A collection path has an odd number of segments (`test`,
//! `users/abc/notes`), a document path an even number (`test/1`,
//! `users/abc/notes/n1`). The last segment of a document path is its id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

fn split_segments(raw: &str) -> StoreResult<Vec<&str>> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::invalid_path(raw, "path is empty"));
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(StoreError::invalid_path(raw, "path contains an empty segment"));
        }
        if *segment == "." || *segment == ".." {
            return Err(StoreError::invalid_path(
                raw,
                format!("segment '{}' is reserved", segment),
            ));
        }
    }
    Ok(segments)
}

/// Path to a single document, e.g. `test/abc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 != 0 {
            return Err(StoreError::invalid_path(
                raw,
                "document paths need an even number of segments",
            ));
        }
        Ok(DocPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document id (last segment).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The collection this document lives in.
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(self.0.clone()),
        }
    }

    /// A sub-collection of this document.
    pub fn collection(&self, collection_id: &str) -> StoreResult<CollectionPath> {
        CollectionPath::parse(&format!("{}/{}", self.0, collection_id))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

/// Path to a collection, e.g. `test` or `users/abc/notes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 != 1 {
            return Err(StoreError::invalid_path(
                raw,
                "collection paths need an odd number of segments",
            ));
        }
        Ok(CollectionPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The collection id (last segment).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The document owning this collection, `None` for top-level collections.
    pub fn parent(&self) -> Option<DocPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| DocPath(parent.to_string()))
    }

    /// The document `id` inside this collection.
    pub fn doc(&self, id: &str) -> StoreResult<DocPath> {
        if id.contains('/') {
            return Err(StoreError::invalid_path(id, "document id must not contain '/'"));
        }
        DocPath::parse(&format!("{}/{}", self.0, id))
    }

    /// True if `path` is a direct child document of this collection.
    pub fn contains(&self, path: &DocPath) -> bool {
        path.parent() == *self
    }
}

macro_rules! path_conversions {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::parse(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = StoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $ty::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

path_conversions!(DocPath);
path_conversions!(CollectionPath);
