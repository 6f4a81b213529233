use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::OrgRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_platform_admin: bool,
    pub org_id: Uuid,
    pub org_role: OrgRole,
    pub current_org_id: Option<Uuid>,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Org a request on behalf of this user should be stamped with:
    /// `current_org_id` if set, else the user's home org.
    pub fn effective_org_id(&self) -> Uuid {
        self.current_org_id.unwrap_or(self.org_id)
    }
}

/// Public-facing projection; never carries `password_hash`.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_platform_admin: bool,
    pub org_id: Uuid,
    pub org_role: OrgRole,
    pub status: UserStatus,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            is_platform_admin: u.is_platform_admin,
            org_id: u.effective_org_id(),
            org_role: u.org_role,
            status: u.status,
        }
    }
}
