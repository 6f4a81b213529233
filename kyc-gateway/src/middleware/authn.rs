//! Authentication resolvers (C6): four mutually-exclusive ways to reach
//! the same [`AuthContext`] shape — user JWT, API key, OAuth2
//! client-credentials token, and admin JWT (a User JWT with an extra
//! platform-admin requirement).

use std::collections::HashSet;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::crypto;
use crate::error::AppError;
use crate::models::{ApiKeyStatus, Permission, UserStatus};
use crate::services::{AuthContext, Database, JwtService};
use crate::store::KeyedStore;

use super::authz::{check_ip_whitelist, check_not_suspended};

/// Extracts an [`AuthContext`] from either a user/admin JWT or an API
/// key bearer token, whichever the `Authorization` header presents.
/// Used on every KYC dispatch and console route.
pub struct Authenticated(pub AuthContext);

/// Same resolution as [`Authenticated`] but additionally requires
/// `is_platform_admin=true`; used on `/admin/**`.
pub struct AdminAuthenticated(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Database: FromRef<S>,
    JwtService: FromRef<S>,
    std::sync::Arc<dyn KeyedStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Database::from_ref(state);
        let jwt = JwtService::from_ref(state);
        let store = std::sync::Arc::<dyn KeyedStore>::from_ref(state);
        let client_ip = extract_ip(parts);

        let raw = bearer_token(parts).ok_or_else(|| {
            record_failure("unknown", "missing_bearer", &client_ip);
            AppError::Unauthorized("missing bearer token".into())
        })?;

        let ctx = if looks_like_api_key(&raw) {
            resolve_api_key(&db, &raw, &client_ip).await?
        } else {
            resolve_jwt(&db, &jwt, &raw, &client_ip).await?
        };

        // Organization-suspension shortcut (spec §4.4): forces 403
        // regardless of role/permission/scope, independent of every
        // other check above. Keyed on whichever user the context
        // actually resolves to — the authenticated user, or the
        // owner of the API key that authenticated the call.
        if let Some(user_id) = ctx.user_id.or(ctx.api_key_owner_id) {
            check_not_suspended(&store, ctx.org_id, user_id).await?;
        }

        Ok(Authenticated(ctx))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminAuthenticated
where
    Database: FromRef<S>,
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(ctx) = Authenticated::from_request_parts(parts, state).await?;
        if !ctx.is_platform_admin {
            let ip = extract_ip(parts);
            record_failure("admin_jwt", "not_platform_admin", &ip);
            return Err(AppError::Forbidden("platform admin required".into()));
        }
        Ok(AdminAuthenticated(ctx))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let raw = parts.headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Bearer ").map(str::to_string)
}

fn extract_ip(parts: &Parts) -> String {
    if let Some(fwd) = parts.headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = fwd.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    parts
        .extensions
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|axum::extract::ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// API keys are `<prefix>_<secret>`; JWTs always contain two dots. This
/// is a cheap, sufficient discriminator between the two bearer shapes.
fn looks_like_api_key(raw: &str) -> bool {
    raw.contains('_') && raw.matches('.').count() != 2
}

async fn resolve_jwt(db: &Database, jwt: &JwtService, raw: &str, client_ip: &str) -> Result<AuthContext, AppError> {
    let claims = jwt.decode(raw).map_err(|e| {
        record_failure("jwt", "invalid_token", client_ip);
        e
    })?;

    let is_oauth_token = claims.custom.get("token_kind").and_then(|v| v.as_str()) == Some("oauth_client");
    if is_oauth_token {
        return resolve_oauth_claims(&claims, client_ip);
    }

    let user_id: uuid::Uuid = claims.sub.parse().map_err(|_| {
        record_failure("jwt", "malformed_subject", client_ip);
        AppError::Unauthorized("malformed token subject".into())
    })?;

    let user = db.find_user_by_id(user_id).await?.ok_or_else(|| {
        record_failure("jwt", "user_not_found", client_ip);
        AppError::Unauthorized("user not found".into())
    })?;

    if user.status != UserStatus::Active {
        record_failure("jwt", "user_suspended", client_ip);
        return Err(AppError::Forbidden("Account Suspended".into()));
    }

    let org_id = claims.org_id.unwrap_or_else(|| user.effective_org_id());
    let member = db.find_active_member(org_id, user.id).await?;
    let org_role = member.map(|m| m.role).unwrap_or(user.org_role);
    let permissions: HashSet<Permission> = org_role.permissions().iter().copied().collect();

    Ok(AuthContext {
        user_id: Some(user.id),
        org_id,
        org_role: Some(org_role),
        permissions,
        raw_scopes: Vec::new(),
        api_key_id: None,
        api_key_owner_id: None,
        oauth_client_id: None,
        is_platform_admin: user.is_platform_admin,
    })
}

fn resolve_oauth_claims(claims: &crate::services::Claims, client_ip: &str) -> Result<AuthContext, AppError> {
    let client_id: uuid::Uuid = claims
        .custom
        .get("client_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            record_failure("oauth", "malformed_client_claim", client_ip);
            AppError::Unauthorized("malformed oauth token".into())
        })?;
    let org_id = claims.org_id.ok_or_else(|| {
        record_failure("oauth", "missing_org_claim", client_ip);
        AppError::Unauthorized("malformed oauth token".into())
    })?;
    let scopes: Vec<String> = claims
        .custom
        .get("scopes")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    Ok(AuthContext {
        user_id: None,
        org_id,
        org_role: None,
        permissions: HashSet::new(),
        raw_scopes: scopes,
        api_key_id: None,
        api_key_owner_id: None,
        oauth_client_id: Some(client_id),
        is_platform_admin: false,
    })
}

async fn resolve_api_key(db: &Database, raw: &str, client_ip: &str) -> Result<AuthContext, AppError> {
    let (_prefix, secret) = raw.split_once('_').ok_or_else(|| {
        record_failure("api_key", "malformed_key", client_ip);
        AppError::Unauthorized("malformed api key".into())
    })?;
    let hashed = crypto::sha256_hex(secret);

    let key = db.find_api_key_by_hash(&hashed).await?.ok_or_else(|| {
        record_failure("api_key", "not_found", client_ip);
        AppError::Unauthorized("invalid api key".into())
    })?;

    if key.status != ApiKeyStatus::Active {
        record_failure("api_key", "revoked", client_ip);
        return Err(AppError::Unauthorized("api key revoked".into()));
    }

    if let Err(e) = check_ip_whitelist(client_ip, &key.ip_whitelist) {
        record_failure("api_key", "ip_not_whitelisted", client_ip);
        return Err(e);
    }

    Ok(AuthContext {
        user_id: None,
        org_id: key.org_id,
        org_role: None,
        permissions: HashSet::new(),
        raw_scopes: key.scopes.clone(),
        api_key_id: Some(key.id),
        api_key_owner_id: Some(key.user_id),
        oauth_client_id: None,
        is_platform_admin: false,
    })
}

fn record_failure(auth_type: &str, reason: &str, client_ip: &str) {
    crate::services::audit::record_auth_failure(auth_type, reason, client_ip);
}

/// Best-effort re-resolution used by the journal/usage middleware (C10,
/// C11) for request attribution. Never surfaces an error — an
/// unauthenticated or malformed request is simply logged as anonymous;
/// the real 401/403 still comes from the [`Authenticated`] extractor.
pub(crate) async fn best_effort_context(db: &Database, jwt: &JwtService, parts: &Parts) -> Option<AuthContext> {
    let client_ip = extract_ip(parts);
    let raw = bearer_token(parts)?;
    let result = if looks_like_api_key(&raw) {
        resolve_api_key(db, &raw, &client_ip).await
    } else {
        resolve_jwt(db, jwt, &raw, &client_ip).await
    };
    result.ok()
}
