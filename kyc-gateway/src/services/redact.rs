//! JSON redaction for the request/response journal. A typed-variant
//! traversal over `serde_json::Value`, not reflection: objects and
//! arrays recurse, strings are checked against the binary-blob and
//! sensitive-key rules.

use serde_json::Value;

const SENSITIVE_SUBSTRINGS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "idcard",
    "id_card",
    "id_number",
    "phone",
    "mobile",
    "email",
    "image",
    "photo",
    "face_image",
    "idcard_image",
    "base64",
    "data",
];

const MAX_CLEAR_STRING_LEN: usize = 1024;
const RESPONSE_TRUNCATE_BYTES: usize = 2048;

pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let redacted = if is_sensitive_key(&k) {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        sanitize(v)
                    };
                    (k, redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(s) => {
            if is_long_base64(&s) {
                Value::String("[Binary Data]".to_string())
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

fn is_long_base64(s: &str) -> bool {
    s.len() > MAX_CLEAR_STRING_LEN
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

/// Parses a captured body as JSON and sanitises it; non-JSON bodies are
/// summarised without being echoed back in clear.
pub fn sanitize_body(raw: &[u8]) -> Option<Value> {
    serde_json::from_slice::<Value>(raw).ok().map(sanitize)
}

/// Truncates the captured response bytes before attempting to parse
/// them, matching the journal's 2048-byte cap on response capture.
pub fn sanitize_response_body(raw: &[u8]) -> Option<Value> {
    let truncated = if raw.len() > RESPONSE_TRUNCATE_BYTES {
        &raw[..RESPONSE_TRUNCATE_BYTES]
    } else {
        raw
    };
    sanitize_body(truncated)
}

/// Multipart bodies are never buffered; the journal records only this
/// marker for them.
pub fn binary_marker() -> Value {
    serde_json::json!({ "binary": true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys_recursively() {
        let input = json!({
            "email": "user@example.com",
            "nested": { "password": "hunter2", "ok": "fine" },
            "list": [{"token": "abc"}, {"ok": "fine"}],
        });
        let out = sanitize(input);
        assert_eq!(out["email"], json!("[REDACTED]"));
        assert_eq!(out["nested"]["password"], json!("[REDACTED]"));
        assert_eq!(out["nested"]["ok"], json!("fine"));
        assert_eq!(out["list"][0]["token"], json!("[REDACTED]"));
        assert_eq!(out["list"][1]["ok"], json!("fine"));
    }

    #[test]
    fn elides_long_base64_strings_under_non_sensitive_keys() {
        let blob: String = "A".repeat(1025);
        let input = json!({ "payload": blob });
        let out = sanitize(input);
        assert_eq!(out["payload"], json!("[Binary Data]"));
    }

    #[test]
    fn leaves_short_strings_alone() {
        let input = json!({ "note": "short and harmless" });
        let out = sanitize(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn sanitize_body_returns_none_for_non_json() {
        assert!(sanitize_body(b"not json at all").is_none());
    }
}
