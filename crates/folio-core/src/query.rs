//! Filter/sort constraints for collection queries and in-process evaluation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::record::{RawDoc, Record, WithId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "in")]
    In,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::In => "in",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            "<" => FilterOp::LessThan,
            "<=" => FilterOp::LessThanOrEqual,
            ">" => FilterOp::GreaterThan,
            ">=" => FilterOp::GreaterThanOrEqual,
            "array-contains" => FilterOp::ArrayContains,
            "in" => FilterOp::In,
            other => {
                return Err(StoreError::Backend(format!(
                    "unknown filter operator '{}'",
                    other
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A single query constraint. Constraints combine with AND; order-bys apply
/// in sequence; the limit applies last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryConstraint {
    Where {
        field: String,
        op: FilterOp,
        value: Value,
    },
    OrderBy {
        field: String,
        #[serde(default)]
        direction: Direction,
    },
    Limit {
        count: usize,
    },
}

impl QueryConstraint {
    pub fn filter(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        QueryConstraint::Where {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        QueryConstraint::OrderBy {
            field: field.into(),
            direction,
        }
    }

    pub fn limit(count: usize) -> Self {
        QueryConstraint::Limit { count }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
/// Integers and floats compare numerically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Look up a possibly dotted field path.
pub fn field_value<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn matches(record: &Record, field: &str, op: FilterOp, expected: &Value) -> bool {
    let Some(actual) = field_value(record, field) else {
        return false;
    };
    let ord = || compare_values(actual, expected);
    match op {
        FilterOp::Equal => ord() == Ordering::Equal,
        FilterOp::NotEqual => !actual.is_null() && ord() != Ordering::Equal,
        FilterOp::LessThan => type_rank(actual) == type_rank(expected) && ord() == Ordering::Less,
        FilterOp::LessThanOrEqual => {
            type_rank(actual) == type_rank(expected) && ord() != Ordering::Greater
        }
        FilterOp::GreaterThan => {
            type_rank(actual) == type_rank(expected) && ord() == Ordering::Greater
        }
        FilterOp::GreaterThanOrEqual => {
            type_rank(actual) == type_rank(expected) && ord() != Ordering::Less
        }
        FilterOp::ArrayContains => actual
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .any(|v| compare_values(v, expected) == Ordering::Equal)
            })
            .unwrap_or(false),
        FilterOp::In => expected
            .as_array()
            .map(|options| {
                options
                    .iter()
                    .any(|v| compare_values(actual, v) == Ordering::Equal)
            })
            .unwrap_or(false),
    }
}

/// Evaluate constraints against documents, the way the hosted service does:
/// documents missing a filtered or ordered field are excluded, ties break
/// on document id, and the limit applies after sorting.
pub fn apply_constraints(mut docs: Vec<RawDoc>, constraints: &[QueryConstraint]) -> Vec<RawDoc> {
    let mut order: Vec<(&str, Direction)> = Vec::new();
    let mut limit = None;

    for constraint in constraints {
        match constraint {
            QueryConstraint::Where { field, op, value } => {
                docs.retain(|doc| matches(&doc.data, field, *op, value));
            }
            QueryConstraint::OrderBy { field, direction } => {
                docs.retain(|doc| field_value(&doc.data, field).is_some());
                order.push((field.as_str(), *direction));
            }
            QueryConstraint::Limit { count } => {
                limit = Some(limit.map_or(*count, |l: usize| l.min(*count)));
            }
        }
    }

    docs.sort_by(|a, b| {
        for (field, direction) in &order {
            let (Some(av), Some(bv)) = (field_value(&a.data, field), field_value(&b.data, field))
            else {
                continue;
            };
            let ord = compare_values(av, bv);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    });

    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    docs
}

/// Per-field sort key. Numbers rank above everything else and compare
/// numerically; other values compare by their string form.
#[derive(Debug)]
enum SortKey {
    Text(String),
    Number(f64),
}

impl SortKey {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => SortKey::Text(String::new()),
            Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::String(s)) => SortKey::Text(s.clone()),
            Some(other) => SortKey::Text(other.to_string()),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Greater,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Less,
        }
    }
}

/// Sort documents newest-first by one or more fields.
///
/// Numeric fields compare numerically and sort ahead of non-numeric ones;
/// anything else compares by its string form, missing values counting as
/// the empty string. The sort is stable.
pub fn sort_docs<T: Serialize>(docs: Vec<WithId<T>>, keys: &[&str]) -> Vec<WithId<T>> {
    let mut keyed: Vec<(Vec<SortKey>, WithId<T>)> = docs
        .into_iter()
        .map(|doc| {
            let fields = match serde_json::to_value(&doc.data) {
                Ok(Value::Object(map)) => map,
                _ => Record::new(),
            };
            let sort_keys = keys
                .iter()
                .map(|key| SortKey::of(field_value(&fields, key)))
                .collect();
            (sort_keys, doc)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| y.compare(x))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    keyed.into_iter().map(|(_, doc)| doc).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, v: Value) -> RawDoc {
        WithId::new(id, v.as_object().cloned().unwrap())
    }

    fn ids(docs: &[RawDoc]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    fn sample() -> Vec<RawDoc> {
        vec![
            doc("a", json!({"n": 3, "tag": "x", "tags": ["red"]})),
            doc("b", json!({"n": 1, "tag": "y"})),
            doc("c", json!({"n": 2.5, "tag": "x", "tags": ["blue", "red"]})),
            doc("d", json!({"tag": "z"})),
        ]
    }

    #[test]
    fn no_constraints_sorts_by_id() {
        let mut docs = sample();
        docs.reverse();
        assert_eq!(ids(&apply_constraints(docs, &[])), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn where_and_order_by() {
        let out = apply_constraints(
            sample(),
            &[
                QueryConstraint::filter("tag", FilterOp::Equal, "x"),
                QueryConstraint::order_by("n", Direction::Desc),
            ],
        );
        assert_eq!(ids(&out), vec!["a", "c"]);
    }

    #[test]
    fn order_by_excludes_missing_fields_and_limit_applies_last() {
        let out = apply_constraints(
            sample(),
            &[
                QueryConstraint::order_by("n", Direction::Asc),
                QueryConstraint::limit(2),
            ],
        );
        assert_eq!(ids(&out), vec!["b", "c"]);
    }

    #[test]
    fn range_filters_do_not_cross_types() {
        let out = apply_constraints(
            sample(),
            &[QueryConstraint::filter("tag", FilterOp::GreaterThan, 0)],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn array_contains_and_in() {
        let out = apply_constraints(
            sample(),
            &[QueryConstraint::filter("tags", FilterOp::ArrayContains, "red")],
        );
        assert_eq!(ids(&out), vec!["a", "c"]);

        let out = apply_constraints(
            sample(),
            &[QueryConstraint::filter("tag", FilterOp::In, json!(["y", "z"]))],
        );
        assert_eq!(ids(&out), vec!["b", "d"]);
    }

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(1), &json!(2.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
    }

    #[test]
    fn sort_docs_newest_first_with_fallback_key() {
        let docs = vec![
            doc("a", json!({"createdAt": 1})),
            doc("b", json!({"createdAt": 3})),
            doc("c", json!({"createdAt": 2, "updatedAt": 10})),
        ];
        let sorted = sort_docs(docs, &["updatedAt", "createdAt"]);
        assert_eq!(ids(&sorted), vec!["c", "b", "a"]);
    }

    #[test]
    fn sort_docs_mixed_types_ignore_input_order() {
        let docs = vec![
            doc("a", json!({"k": 10})),
            doc("b", json!({"k": 9})),
            doc("c", json!({"k": "5"})),
        ];
        let mut orders = Vec::new();
        for rotation in 0..3 {
            let mut input = docs.clone();
            input.rotate_left(rotation);
            orders.push(
                ids(&sort_docs(input, &["k"]))
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }
        assert!(orders.iter().all(|o| o == &["a", "b", "c"]), "{:?}", orders);
    }

    #[test]
    fn filter_op_parses() {
        assert_eq!("array-contains".parse::<FilterOp>().unwrap(), FilterOp::ArrayContains);
        assert!("~=".parse::<FilterOp>().is_err());
    }
}
