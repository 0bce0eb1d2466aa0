//! Field-name convention translation at the remote boundary.
//!
//! In-memory records use camelCase keys; the remote store uses
//! snake_case columns. The transform is applied at exactly two points
//! (serialize-for-remote, deserialize-from-remote) so no case-conversion
//! logic leaks into business code.
//!
//! The mapping is shallow: only top-level keys are renamed. Nested values
//! (the settings row's JSON payload) pass through untouched, matching how
//! the backend stores them.

use serde_json::{Map, Value};

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn map_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(object) => {
            let mut renamed = Map::with_capacity(object.len());
            for (key, field) in object {
                renamed.insert(rename(&key), field);
            }
            Value::Object(renamed)
        }
        other => other,
    }
}

/// Rename a local record's keys into the remote convention.
pub fn record_to_remote(record: Value) -> Value {
    map_keys(record, camel_to_snake)
}

/// Rename a remote record's keys into the local convention.
pub fn record_from_remote(record: Value) -> Value {
    map_keys(record, snake_to_camel)
}
