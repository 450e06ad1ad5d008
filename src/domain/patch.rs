//! Merge-patch generation between two versions of an item.

use serde_json::{Map, Value};

/// Builds the JSON merge-patch that turns `current` into `next`.
///
/// Keys starting with `_` belong to the backend (`_id`, `_etag`, `_updated`)
/// and are never sent. Nested objects are diffed recursively; every other
/// value, arrays included, is replaced whole. Removed keys map to `null`.
pub fn generate_patch(current: &Value, next: &Value) -> Map<String, Value> {
    let empty = Map::new();
    let current = current.as_object().unwrap_or(&empty);
    let next = next.as_object().unwrap_or(&empty);
    diff_objects(current, next)
}

fn diff_objects(current: &Map<String, Value>, next: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();

    for (key, value) in next {
        if key.starts_with('_') {
            continue;
        }
        match (current.get(key), value) {
            (Some(old), new) if old == new => {}
            (Some(Value::Object(old)), Value::Object(new)) => {
                let nested = diff_objects(old, new);
                if !nested.is_empty() {
                    patch.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {
                patch.insert(key.clone(), value.clone());
            }
        }
    }

    for key in current.keys() {
        if !key.starts_with('_') && !next.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    patch
}
