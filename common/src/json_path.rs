//! Dot-separated path access into JSON documents.
//!
//! Session payloads and identity records are free-form JSON, and the MFA
//! configuration addresses values inside them with paths such as
//! `Auth.session.is_mfa_completed`. Each segment indexes an object key, or an
//! array element when the segment is a non-negative integer.

use serde_json::{Map, Value};

/// Look up `path` inside `value`. An empty path returns `value` itself.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Look up `path` inside an object map.
pub fn lookup_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    };
    map.get(head).and_then(|value| lookup(value, rest))
}

/// Write `new` at `path`, creating intermediate objects as needed.
///
/// Any non-object value found along the way is replaced by an object.
pub fn insert(value: &mut Value, path: &str, new: Value) {
    let mut current = value;
    for segment in path.split('.') {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current.as_object_mut() {
            Some(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            None => unreachable!("value was just replaced by an object"),
        };
    }
    *current = new;
}

/// Whether a value counts as "empty": null, false, zero, the empty string,
/// the string `"0"`, or an empty array or object.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Whether a value counts as set and true (the inverse of [`is_empty`]).
pub fn is_truthy(value: &Value) -> bool {
    !is_empty(value)
}

/// Render a scalar as a credential string. Objects, arrays and null have no
/// string form.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
