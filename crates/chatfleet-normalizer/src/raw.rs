// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient field access over untyped platform payloads.
//!
//! Ids arrive as strings or numbers, nested objects sometimes arrive as JSON
//! strings, and booleans sometimes arrive as 0/1. Every accessor here returns
//! `None` instead of failing.

use serde_json::{Map, Value};

/// First key whose value is a non-empty string or a number.
pub fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn i64_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    i64_field(value, keys).and_then(|v| u64::try_from(v).ok())
}

pub fn u32_field(value: &Value, keys: &[&str]) -> Option<u32> {
    i64_field(value, keys).and_then(|v| u32::try_from(v).ok())
}

pub fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// An object field, decoding it first when it was sent as a JSON string.
pub fn object_field(value: &Value, key: &str) -> Option<Value> {
    as_object(value.get(key)?)
}

/// The value itself when it is an object, or its decoded form when it is a
/// JSON string holding an object.
pub fn as_object(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            _ => None,
        },
        _ => None,
    }
}

/// Lifts a `{ data: {...}, threadId, isSelf, type }` envelope into one flat object.
///
/// Fields inside `data` win; envelope fields fill the gaps. Non-object input
/// yields `None`.
pub fn flatten_envelope(payload: &Value) -> Option<Map<String, Value>> {
    let outer = payload.as_object()?;
    let Some(Value::Object(inner)) = outer.get("data") else {
        return Some(outer.clone());
    };

    let mut flat = inner.clone();
    for (key, value) in outer {
        if key == "data" {
            continue;
        }
        if key == "type" {
            // The envelope's numeric `type` is the thread kind.
            flat.entry("threadType".to_string())
                .or_insert_with(|| value.clone());
            continue;
        }
        flat.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Some(flat)
}
