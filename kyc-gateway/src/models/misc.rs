use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Used,
    Expired,
    Accepted,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub status: RecordStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub type InvitationStatus = RecordStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub role: super::role::OrgRole,
    pub token_hash: String,
    pub status: InvitationStatus,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Persisted row only — no delivery transport in the core. A real
/// deployment wires this to an `EmailProvider`-style transport; this
/// crate stops at the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}
