use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub request_id: String,
    pub user_id: Option<Uuid>,
    pub org_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request/response journal row. Bodies are sanitised before being
/// stored: no field whose name matches a sensitive substring, and no
/// long base64-looking string, ever appears in clear.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiRequestLog {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub api_key_name: Option<String>,
    pub method: String,
    pub path: String,
    pub status: i32,
    pub latency_ms: i64,
    pub client_ip: String,
    pub request_body: Option<Value>,
    pub response_body: Option<Value>,
    pub created_at: DateTime<Utc>,
}
