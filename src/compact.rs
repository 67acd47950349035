//! Null/empty stripping for decoded JSON
//!
//! API payloads carry many `null` and empty fields. [`compact`] removes them
//! recursively so output stays readable. `false` and `0` are values, not
//! absences, and are kept.

use serde_json::{Map, Value};

/// Recursively drop `null`, `""`, `[]` and `{}` from objects and arrays.
///
/// Containers that become empty after compaction are dropped from their
/// parent too. The top-level value itself is always returned, even if empty.
pub fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(compact_object(map)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(compact)
                .filter(|v| !is_blank(v))
                .collect(),
        ),
        other => other,
    }
}

fn compact_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (k, compact(v)))
        .filter(|(_, v)| !is_blank(v))
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
