//! Deterministic JSON for signing and hashing.

use crate::error::{Result, StorageError};
use serde::Serialize;
use serde_json::Value;

/// Serializes `value` with object keys sorted and no whitespace.
///
/// # Examples
///
/// ```
/// use nullwipe::cert::canonical::canonical_json;
/// use serde_json::json;
///
/// let bytes = canonical_json(&json!({"b": 1, "a": {"d": [true, null], "c": "x"}}));
/// assert_eq!(bytes, br#"{"a":{"c":"x","d":[true,null]},"b":1}"#);
/// ```
#[must_use]
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

/// Canonical JSON of any serializable value.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as JSON.
pub fn canonical_json_of<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(canonical_json(&value))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sorted_nested_keys() {
        let value = json!({"z": {"y": 1, "x": 2}, "a": [{"k2": 0, "k1": 0}]});
        assert_eq!(
            canonical_json(&value),
            br#"{"a":[{"k1":0,"k2":0}],"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn test_escapes_strings() {
        let value = json!({"q": "say \"hi\"\n"});
        assert_eq!(canonical_json(&value), br#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_json(&json!(null)), b"null");
        assert_eq!(canonical_json(&json!(1.5)), b"1.5");
        assert_eq!(canonical_json(&json!(-3)), b"-3");
    }

    proptest! {
        #[test]
        fn test_canonical_is_valid_json(keys in proptest::collection::vec("[a-z]{1,6}", 0..8)) {
            let map: serde_json::Map<String, Value> =
                keys.iter().enumerate().map(|(i, k)| (k.clone(), json!(i))).collect();
            let value = Value::Object(map);
            let bytes = canonical_json(&value);
            let parsed: Value = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
