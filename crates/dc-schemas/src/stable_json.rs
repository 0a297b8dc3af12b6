//! Deterministic JSON serialization: sorted keys, compact separators, no
//! trailing whitespace. Every ledger line and every atomically-written
//! summary file goes through [`dumps`] so that re-running a day's pipeline
//! against unchanged inputs produces byte-identical output.

use serde_json::Value;

/// Recursively sort object keys. Arrays keep their element order; only
/// key order within objects is canonicalized.
pub fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Serialize `v` as compact JSON with recursively sorted object keys:
/// `{"a":1,"b":2}`, no whitespace anywhere.
pub fn dumps<T: serde::Serialize>(v: &T) -> serde_json::Result<String> {
    let raw = serde_json::to_value(v)?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_nested_keys() {
        let v = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let sorted = sort_keys(&v);
        assert_eq!(serde_json::to_string(&sorted).unwrap(), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn dumps_is_compact_and_stable_across_field_order() {
        #[derive(serde::Serialize)]
        struct A {
            b: i32,
            a: i32,
        }
        let s = dumps(&A { b: 1, a: 2 }).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1}"#);
        assert!(!s.contains(' '));
    }
}
