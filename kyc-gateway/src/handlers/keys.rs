//! Programmatic API key lifecycle: create (plaintext materialised once),
//! list (never carries secrets — `ApiKey::secret_hash` is
//! `serde(skip_serializing)`), revoke.

use axum::extract::{Path, Query, State};
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::crypto;
use crate::error::AppError;
use crate::middleware::authz::scope_permission;
use crate::middleware::Authenticated;
use crate::models::{deserialize_scopes, ApiKey, ApiKeyCreated, Permission};
use crate::AppState;

use super::Envelope;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateKeyRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    #[serde(deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub ip_whitelist: Vec<String>,
}

pub async fn create(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<Envelope<ApiKeyCreated>>, AppError> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let user_id = ctx
        .user_id
        .ok_or_else(|| AppError::Forbidden("only console-authenticated users may create keys".into()))?;

    let prefix = random_prefix();
    let secret = random_secret();
    let raw_key = format!("{prefix}_{secret}");
    let secret_hash = crypto::sha256_hex(&secret);

    let key = state
        .db
        .insert_api_key(Uuid::new_v4(), user_id, ctx.org_id, &req.name, &prefix, &secret_hash, &req.scopes, &req.ip_whitelist)
        .await?;

    Ok(Json(Envelope::new(ApiKeyCreated {
        id: key.id,
        name: key.name,
        key: raw_key,
        scopes: key.scopes,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub scope: Option<String>,
}

/// `?scope=personal` (the default) lists only the caller's own keys and
/// needs no org permission, since a user always sees their own keys.
/// Any other value asks for the whole org's roster and is gated behind
/// `keys.read`, per the scope-param guard in spec §4.4 rule 6.
pub async fn list(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Query(q): Query<ListKeysQuery>,
) -> Result<Json<Envelope<Vec<ApiKey>>>, AppError> {
    let user_id = ctx
        .user_id
        .ok_or_else(|| AppError::Forbidden("only console-authenticated users may list keys".into()))?;

    if q.scope.as_deref() == Some("org") {
        scope_permission(&ctx, None, &[Permission::KeysRead])?;
        let keys = state.db.list_org_api_keys(ctx.org_id).await?;
        return Ok(Json(Envelope::new(keys)));
    }

    let keys = state.db.list_user_api_keys(user_id).await?;
    Ok(Json(Envelope::new(keys)))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub deleted: bool,
}

pub async fn revoke(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<RevokeResponse>>, AppError> {
    let user_id = ctx
        .user_id
        .ok_or_else(|| AppError::Forbidden("only console-authenticated users may revoke keys".into()))?;
    let key = state
        .db
        .find_api_key(id)
        .await?
        .ok_or_else(|| AppError::NotFound("api key not found".into()))?;
    if key.user_id != user_id {
        return Err(AppError::Forbidden("PERMISSION_DENIED".into()));
    }
    state.db.revoke_api_key(id).await?;
    Ok(Json(Envelope::new(RevokeResponse { deleted: true })))
}

fn random_prefix() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.gen();
    hex::encode(bytes)
}

fn random_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 24] = rng.gen();
    hex::encode(bytes)
}
