//! Typed value encoding used by the Firestore REST API.
//!
//! Plain JSON maps to tagged values (`{"integerValue": "42"}`,
//! `{"mapValue": {"fields": {...}}}`). Decoding flattens them back.
//! Timestamps, bytes, and references decode to strings; geo points decode
//! to `{latitude, longitude}` maps.

use serde_json::{json, Map, Number, Value};

use folio_core::{Record, StoreError, StoreResult};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn malformed(detail: impl Into<String>) -> StoreError {
    StoreError::Backend(format!("malformed value in response: {}", detail.into()))
}

pub fn decode_value(value: &Value) -> StoreResult<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(value.to_string()))?;
    let (tag, inner) = obj
        .iter()
        .find(|(k, _)| k.ends_with("Value"))
        .ok_or_else(|| malformed(value.to_string()))?;

    Ok(match tag.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(|| malformed("booleanValue"))?),
        "integerValue" => {
            let n = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .map_err(|_| malformed(format!("integerValue '{}'", s)))?,
                Value::Number(n) => n.as_i64().ok_or_else(|| malformed("integerValue"))?,
                _ => return Err(malformed("integerValue")),
            };
            Value::Number(n.into())
        }
        "doubleValue" => {
            let f = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| malformed("doubleValue"))?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => Value::String(
            inner
                .as_str()
                .ok_or_else(|| malformed(tag.as_str()))?
                .to_string(),
        ),
        "geoPointValue" => {
            let mut point = Map::new();
            point.insert(
                "latitude".to_string(),
                inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            );
            point.insert(
                "longitude".to_string(),
                inner.get("longitude").cloned().unwrap_or(json!(0.0)),
            );
            Value::Object(point)
        }
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<StoreResult<Vec<_>>>()?,
                _ => Vec::new(),
            };
            Value::Array(values)
        }
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))?),
        other => return Err(malformed(format!("unknown tag '{}'", other))),
    })
}

/// Decode a `fields` object. A missing object decodes to an empty record.
pub fn decode_fields(fields: Option<&Value>) -> StoreResult<Record> {
    match fields {
        None | Some(Value::Null) => Ok(Record::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.clone(), decode_value(v)?)))
            .collect(),
        Some(other) => Err(malformed(other.to_string())),
    }
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render a field path for `updateMask` / `orderBy`, backquoting segments
/// that are not plain identifiers.
pub fn encode_field_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| {
            let s = s.as_ref();
            if is_simple_segment(s) {
                s.to_string()
            } else {
                format!("`{}`", s.replace('\\', "\\\\").replace('`', "\\`"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
