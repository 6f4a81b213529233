//! Authorization engine (C7): the permission/scope/suspension checks
//! layered on top of whatever [`AuthContext`](crate::services::AuthContext)
//! authentication produced. These are plain functions rather than
//! extractors — each route calls the ones its operation needs, in the
//! order its semantics require.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Permission;
use crate::services::AuthContext;
use crate::store::KeyedStore;

use super::ip_allow::ip_matches_any;

/// Platform admin or org owner/admin shortcut: passes any "require any
/// of" check outright, per rule 1–2 of the authorization engine.
fn passes_shortcut(ctx: &AuthContext) -> bool {
    ctx.passes_role_shortcut()
}

/// Rule 3: exact permission (or wildcard) required.
pub fn require_permission(ctx: &AuthContext, permission: Permission) -> Result<(), AppError> {
    if passes_shortcut(ctx) || ctx.has_permission(permission) {
        return Ok(());
    }
    record_denied("permission", permission.as_str());
    Err(AppError::Forbidden("PERMISSION_DENIED".into()))
}

/// Rule 4: union match against a set of acceptable permissions.
pub fn require_any_permission(ctx: &AuthContext, permissions: &[Permission]) -> Result<(), AppError> {
    if passes_shortcut(ctx) || ctx.has_any_permission(permissions) {
        return Ok(());
    }
    record_denied("any_permission", "multiple");
    Err(AppError::Forbidden("PERMISSION_DENIED".into()))
}

/// Rule 5: API-key scope must include `scope`, accepted in either
/// JSON-array or space-separated form (already normalized into
/// `raw_scopes` by the authn resolver).
pub fn require_key_scope(ctx: &AuthContext, scope: &str) -> Result<(), AppError> {
    if ctx.has_scope(scope) {
        return Ok(());
    }
    record_denied("key_scope", scope);
    Err(AppError::Forbidden("PERMISSION_DENIED".into()))
}

/// Rule 6: the personal/org visibility switch. `scope=personal` on the
/// query string bypasses the org-permission check entirely; any other
/// value (or its absence) falls back to `RequireAnyPermission`.
pub fn scope_permission(
    ctx: &AuthContext,
    query_scope: Option<&str>,
    permissions: &[Permission],
) -> Result<(), AppError> {
    if query_scope == Some("personal") {
        return Ok(());
    }
    require_any_permission(ctx, permissions)
}

/// Rule 7: client IP (already resolved via forwarded-for) must match an
/// API key's whitelist. Empty list allows everything. A mismatch is a
/// `suspicious_ip_access` event, not just a denial.
pub fn check_ip_whitelist(client_ip: &str, whitelist: &[String]) -> Result<(), AppError> {
    if ip_matches_any(client_ip, whitelist) {
        return Ok(());
    }
    metrics::counter!("suspicious_ip_access_total").increment(1);
    Err(AppError::Forbidden("source IP not permitted".into()))
}

/// Organization-suspension shortcut: a flag in the keyed store,
/// independent of every other check above. If set, the caller is
/// rejected regardless of permissions, scopes, or admin shortcuts.
pub async fn check_not_suspended(
    store: &Arc<dyn KeyedStore>,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    let key = format!("suspended:{org_id}:{user_id}");
    if store.exists(&key).await.map_err(|_| AppError::ServiceUnavailable)? {
        return Err(AppError::Forbidden("Account Suspended".into()));
    }
    Ok(())
}

fn record_denied(check: &str, detail: &str) {
    metrics::counter!(
        "business_operation_errors_total",
        "operation" => check.to_string(),
        "error_type" => detail.to_string(),
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ctx(permissions: &[Permission], role: Option<crate::models::OrgRole>) -> AuthContext {
        AuthContext {
            user_id: Some(Uuid::new_v4()),
            org_id: Uuid::new_v4(),
            org_role: role,
            permissions: permissions.iter().copied().collect::<HashSet<_>>(),
            raw_scopes: Vec::new(),
            api_key_id: None,
            api_key_owner_id: None,
            oauth_client_id: None,
            is_platform_admin: false,
        }
    }

    #[test]
    fn owner_role_shortcut_passes_without_explicit_permission() {
        let c = ctx(&[], Some(crate::models::OrgRole::Owner));
        assert!(require_permission(&c, Permission::BillingWrite).is_ok());
    }

    #[test]
    fn viewer_without_permission_is_denied() {
        let c = ctx(&[Permission::OrgRead], Some(crate::models::OrgRole::Viewer));
        assert!(require_permission(&c, Permission::BillingWrite).is_err());
    }

    #[test]
    fn personal_scope_query_bypasses_permission_check() {
        let c = ctx(&[], Some(crate::models::OrgRole::Viewer));
        assert!(scope_permission(&c, Some("personal"), &[Permission::LogsRead]).is_ok());
        assert!(scope_permission(&c, None, &[Permission::LogsRead]).is_err());
    }

    #[test]
    fn key_scope_requires_exact_or_wildcard_match() {
        let mut c = ctx(&[], None);
        c.raw_scopes = vec!["ocr:read".to_string()];
        assert!(require_key_scope(&c, "ocr:read").is_ok());
        assert!(require_key_scope(&c, "face:write").is_err());
    }
}
