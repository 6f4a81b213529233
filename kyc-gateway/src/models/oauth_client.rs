use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OAuthClientStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OAuthClient {
    pub id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    pub org_id: Uuid,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub status: OAuthClientStatus,
    pub token_ttl_secs: i64,
    pub created_at: DateTime<Utc>,
}

/// Returned to the caller exactly once, on creation — the plaintext
/// secret is never recoverable after this response.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthClientCreated {
    pub id: Uuid,
    pub client_id: String,
    pub client_secret: String,
    pub name: String,
    pub scopes: Vec<String>,
}
