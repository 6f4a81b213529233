//! The shared authentication context every resolver produces and every
//! authorization check consumes.

use std::collections::HashSet;
use uuid::Uuid;

use crate::models::Permission;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Option<Uuid>,
    pub org_id: Uuid,
    pub org_role: Option<crate::models::OrgRole>,
    pub permissions: HashSet<Permission>,
    pub raw_scopes: Vec<String>,
    pub api_key_id: Option<Uuid>,
    pub api_key_owner_id: Option<Uuid>,
    pub oauth_client_id: Option<Uuid>,
    pub is_platform_admin: bool,
}

impl AuthContext {
    pub fn has_permission(&self, p: Permission) -> bool {
        self.permissions.contains(&Permission::Wildcard) || self.permissions.contains(&p)
    }

    pub fn has_any_permission(&self, perms: &[Permission]) -> bool {
        self.permissions.contains(&Permission::Wildcard) || perms.iter().any(|p| self.permissions.contains(p))
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.raw_scopes.iter().any(|s| s == scope || s == "*")
    }

    /// Platform admin or org owner/admin shortcut — passes any
    /// "require any permission" check outright.
    pub fn passes_role_shortcut(&self) -> bool {
        self.is_platform_admin || self.org_role.map(|r| r.is_admin_shortcut()).unwrap_or(false)
    }

    /// Actor attributed for usage metering: the authenticated user if an
    /// active org member, else the key owner — already folded into
    /// `user_id`/`api_key_owner_id` by the resolvers, so this is a
    /// simple precedence chain.
    pub fn actor_user_id(&self) -> Option<Uuid> {
        self.user_id.or(self.api_key_owner_id)
    }
}
