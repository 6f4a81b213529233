use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}

/// A caller-held secret bound to exactly one user; the org is the tenant
/// boundary. `secret_hash` is the only form ever persisted — the
/// plaintext is materialised once, at creation, and never again.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub scopes: Vec<String>,
    pub status: ApiKeyStatus,
    /// Empty ⇒ allow all source IPs.
    pub ip_whitelist: Vec<String>,
    pub rolling_total: i64,
    pub rolling_success: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == "*")
    }
}

/// Returned to the caller exactly once, on creation.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyCreated {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    pub scopes: Vec<String>,
}

/// Scopes accepted in either JSON-array or space-separated form.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    raw.split_whitespace().map(|s| s.to_string()).collect()
}

/// `serde(deserialize_with = ...)` hook for request bodies whose
/// `scopes` field may arrive as a JSON array or as a single
/// space-separated string (spec §4.4 rule 5). Used by the API-key and
/// OAuth-client creation requests, the two places scopes first enter
/// the system.
pub fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScopesInput {
        List(Vec<String>),
        Text(String),
    }
    match ScopesInput::deserialize(deserializer)? {
        ScopesInput::List(list) => Ok(list),
        ScopesInput::Text(text) => Ok(parse_scopes(&text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scopes_accepts_json_array() {
        assert_eq!(parse_scopes(r#"["ocr:read","face:write"]"#), vec!["ocr:read", "face:write"]);
    }

    #[test]
    fn parse_scopes_accepts_space_separated_form() {
        assert_eq!(parse_scopes("ocr:read face:write"), vec!["ocr:read", "face:write"]);
    }

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize_scopes")]
        scopes: Vec<String>,
    }

    #[test]
    fn deserialize_scopes_accepts_json_array_field() {
        let w: Wrapper = serde_json::from_str(r#"{"scopes":["ocr:read","face:write"]}"#).unwrap();
        assert_eq!(w.scopes, vec!["ocr:read", "face:write"]);
    }

    #[test]
    fn deserialize_scopes_accepts_space_separated_string_field() {
        let w: Wrapper = serde_json::from_str(r#"{"scopes":"ocr:read face:write"}"#).unwrap();
        assert_eq!(w.scopes, vec!["ocr:read", "face:write"]);
    }
}
