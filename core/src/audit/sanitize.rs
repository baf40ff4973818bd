use serde_json::Value;

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Field-name fragments whose values never reach the log buffer.
pub const SENSITIVE_FIELDS: [&str; 5] = ["password", "token", "api_key", "ssn", "credit_card"];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|f| lower.contains(f))
}

/// Returns a copy of `payload` with every sensitive field replaced by
/// [`REDACTION_MARKER`]. Objects and arrays are walked recursively; a
/// sensitive key hides its whole value, nested or not.
pub fn sanitize_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(k.clone(), sanitize_payload(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_payload).collect()),
        // NUL bytes break downstream renderers and CSV consumers.
        Value::String(s) if s.contains('\0') => Value::String(s.replace('\0', "")),
        other => other.clone(),
    }
}
