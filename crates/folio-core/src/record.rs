//! Record payloads and the id wrapper attached on read.

use serde::de::DeserializeOwned;
use serde::ser::{Error as _, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A stored document payload. No schema is enforced at this layer.
pub type Record = serde_json::Map<String, Value>;

/// A raw document as returned by a store.
pub type RawDoc = WithId<Record>;

/// A document payload paired with the id derived from its path.
///
/// The id lives beside the payload, never inside it, so a payload read and
/// written back cannot smuggle an `id` field into storage. Serialized flat,
/// `id` first; a stored `id` field in the payload is dropped in favour of
/// the path id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithId<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> WithId<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithId<U> {
        WithId {
            id: self.id,
            data: f(self.data),
        }
    }
}

impl<T: Serialize> Serialize for WithId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = match serde_json::to_value(&self.data).map_err(S::Error::custom)? {
            Value::Object(map) => map,
            other => {
                return Err(S::Error::custom(format!(
                    "document payload must be an object, got {}",
                    type_name(&other)
                )))
            }
        };

        let shadowed = usize::from(fields.contains_key("id"));
        let mut map = serializer.serialize_map(Some(fields.len() + 1 - shadowed))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "id") {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Options for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    /// Deep-merge into the existing document instead of replacing it.
    #[serde(default)]
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// Serialize a caller type into a record. Non-object values are rejected.
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> StoreResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(type_name(&other).to_string())),
    }
}

/// Deserialize a stored record into the caller's expected shape.
pub fn from_record<T: DeserializeOwned>(path: &str, record: Record) -> StoreResult<T> {
    serde_json::from_value(Value::Object(record)).map_err(|source| StoreError::Schema {
        path: path.to_string(),
        source,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Apply a partial update. Keys may be dotted field paths (`"a.b"`), which
/// address nested maps and create them when missing.
pub fn apply_update(target: &mut Record, patch: &Record) {
    for (key, value) in patch {
        let segments: Vec<&str> = key.split('.').collect();
        set_field(target, &segments, value.clone());
    }
}

fn set_field(target: &mut Record, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            target.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Record::new()));
            if !entry.is_object() {
                *entry = Value::Object(Record::new());
            }
            if let Value::Object(child) = entry {
                set_field(child, rest, value);
            }
        }
    }
}

/// Deep-merge `patch` into `target`: nested maps merge, everything else
/// overwrites.
pub fn deep_merge(target: &mut Record, patch: &Record) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Field paths of every leaf in `record`, as segment lists. Empty maps are
/// leaves.
pub fn leaf_field_paths(record: &Record) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    collect_leaves(record, &mut Vec::new(), &mut out);
    out
}

fn collect_leaves(record: &Record, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for (key, value) in record {
        prefix.push(key.clone());
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, prefix, out),
            _ => out.push(prefix.clone()),
        }
        prefix.pop();
    }
}
