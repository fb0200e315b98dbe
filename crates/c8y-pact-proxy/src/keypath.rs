//! Dotted key paths over JSON trees.
//!
//! A path such as `response.headers.set-cookie` or `records.0.request.url`
//! addresses a value inside a `serde_json::Value`. Object keys are matched
//! exactly first and then case-insensitively, so header names recorded as
//! `Authorization` are found by `request.headers.authorization`. Numeric
//! segments index into arrays.

use serde_json::Value;

/// Split a dotted path into its segments, dropping empty ones.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn object_key(map: &serde_json::Map<String, Value>, segment: &str) -> Option<String> {
    if map.contains_key(segment) {
        return Some(segment.to_string());
    }
    map.keys().find(|k| k.eq_ignore_ascii_case(segment)).cloned()
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => object_key(map, segment).and_then(|k| map.get(&k)),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => {
            let key = object_key(map, segment)?;
            map.get_mut(&key)
        }
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

/// Resolve `path` inside `value`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(value, |current, segment| child(current, segment))
}

/// Resolve `path` inside `value` for mutation.
pub fn get_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    segments(path)
        .into_iter()
        .try_fold(value, |current, segment| child_mut(current, segment))
}

/// Overwrite the value at `path` if it exists and is not null.
///
/// Returns whether a value was replaced. Missing paths are left alone.
pub fn replace_existing(value: &mut Value, path: &str, replacement: Value) -> bool {
    match get_mut(value, path) {
        Some(target) if !target.is_null() => {
            *target = replacement;
            true
        }
        _ => false,
    }
}

/// Delete the value at `path`, returning it if it was present.
pub fn remove(value: &mut Value, path: &str) -> Option<Value> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;
    let parent = parents
        .iter()
        .try_fold(value, |current, segment| child_mut(current, segment))?;
    match parent {
        Value::Object(map) => {
            let key = object_key(map, last)?;
            map.remove(&key)
        }
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_and_case_insensitive() {
        let value = json!({"request": {"headers": {"Authorization": "Basic abc"}}});
        assert_eq!(
            get(&value, "request.headers.authorization"),
            Some(&json!("Basic abc"))
        );
        assert_eq!(get(&value, "request.body"), None);
    }

    #[test]
    fn test_get_array_index() {
        let value = json!({"records": [{"id": 1}, {"id": 2}]});
        assert_eq!(get(&value, "records.1.id"), Some(&json!(2)));
        assert_eq!(get(&value, "records.5.id"), None);
    }

    #[test]
    fn test_replace_existing_skips_missing_and_null() {
        let mut value = json!({"a": {"b": "x", "n": null}});
        assert!(replace_existing(&mut value, "a.b", json!("***")));
        assert!(!replace_existing(&mut value, "a.c", json!("***")));
        assert!(!replace_existing(&mut value, "a.n", json!("***")));
        assert_eq!(value, json!({"a": {"b": "***", "n": null}}));
    }

    #[test]
    fn test_remove() {
        let mut value = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        assert_eq!(remove(&mut value, "a.b"), Some(json!(1)));
        assert_eq!(remove(&mut value, "list.0"), Some(json!(1)));
        assert_eq!(remove(&mut value, "a.missing"), None);
        assert_eq!(value, json!({"a": {"c": 2}, "list": [2, 3]}));
    }

    #[test]
    fn test_empty_path_resolves_to_root() {
        let value = json!({"a": 1});
        assert_eq!(get(&value, ""), Some(&value));
    }
}
