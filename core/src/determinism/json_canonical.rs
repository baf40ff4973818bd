use crate::error::CoreResult;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Compact JSON with object keys sorted at every depth. Log digests are
/// computed over these bytes, so payload key order never changes a digest.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let normalized = normalize_value(v);
    let s = serde_json::to_string(&normalized)?;
    Ok(s.into_bytes())
}

pub fn to_canonical_string<T: Serialize>(value: &T) -> CoreResult<String> {
    let bytes = to_canonical_bytes(value)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn normalize_value(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, vv)| (k, normalize_value(vv)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(normalize_value).collect()),
        other => other,
    }
}
