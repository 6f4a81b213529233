use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum KycRequestType {
    Ocr,
    FaceVerify,
    FaceSearch,
    Liveness,
    FullVerify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum KycRequestStatus {
    Processing,
    Success,
    Failed,
}

/// Long-lived record of a biometric verification attempt. Never deleted
/// by the core. ID number / phone / name are stored only in encrypted
/// (AES-256-GCM) or hashed form — never in clear.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KycRequest {
    pub id: Uuid,
    pub org_id: Uuid,
    pub request_type: KycRequestType,
    pub status: KycRequestStatus,
    pub error_message: Option<String>,
    pub idcard_sealed: Option<String>,
    pub idcard_index_hash: Option<String>,
    pub name_sealed: Option<String>,
    pub phone_sealed: Option<String>,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KycRequestSnapshot {
    pub request_id: Uuid,
    pub status: KycRequestStatus,
    pub message: Option<String>,
}

impl From<&KycRequest> for KycRequestSnapshot {
    fn from(r: &KycRequest) -> Self {
        Self {
            request_id: r.id,
            status: r.status,
            message: r.error_message.clone(),
        }
    }
}
