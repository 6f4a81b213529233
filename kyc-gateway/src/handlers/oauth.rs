//! OAuth2 client-credentials surface (C16): record CRUD for
//! [`OAuthClient`] plus the token-minting endpoint the gateway proxies
//! client-credentials grants through. Implementing the authorization
//! code/redirect flow itself is out of scope — only the credentials
//! grant this service actually consumes via [`Authenticated`]'s OAuth
//! resolver.

use axum::extract::{Path, State};
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::crypto;
use crate::error::AppError;
use crate::middleware::authz::require_permission;
use crate::middleware::Authenticated;
use crate::models::{deserialize_scopes, OAuthClient, OAuthClientCreated, Permission};
use crate::services::jwt::IssuedToken;
use crate::AppState;

use super::Envelope;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    #[serde(deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_token_ttl_secs() -> i64 {
    3600
}

pub async fn create(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Json(req): Json<CreateClientRequest>,
) -> Result<Json<Envelope<OAuthClientCreated>>, AppError> {
    require_permission(&ctx, Permission::KeysWrite)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let client_id = random_client_id();
    let client_secret = random_client_secret();
    let secret_hash = crypto::hash_password(&client_secret)?;

    let client = state
        .db
        .insert_oauth_client(
            Uuid::new_v4(),
            &client_id,
            &secret_hash,
            ctx.org_id,
            &req.name,
            &req.redirect_uris,
            &req.scopes,
            req.token_ttl_secs,
        )
        .await?;

    Ok(Json(Envelope::new(OAuthClientCreated {
        id: client.id,
        client_id: client.client_id,
        client_secret,
        name: client.name,
        scopes: client.scopes,
    })))
}

pub async fn list(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<OAuthClient>>>, AppError> {
    require_permission(&ctx, Permission::KeysRead)?;
    let clients = state.db.list_oauth_clients(ctx.org_id).await?;
    Ok(Json(Envelope::new(clients)))
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
    require_permission(&ctx, Permission::KeysWrite)?;
    let client = state
        .db
        .find_oauth_client_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("oauth client not found".into()))?;
    if client.org_id != ctx.org_id {
        return Err(AppError::Forbidden("PERMISSION_DENIED".into()));
    }
    state.db.revoke_oauth_client(id).await?;
    Ok(Json(Envelope::new(RevokeResponse { deleted: true })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub grant_type: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub client_secret: String,
}

/// The credentials grant itself: no [`Authenticated`] extraction here —
/// the client_id/client_secret pair in the body *is* the credential,
/// exactly as the API-key and user-login handlers authenticate off the
/// request body rather than a bearer header.
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<Envelope<IssuedToken>>, AppError> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    if req.grant_type != "client_credentials" {
        return Err(AppError::Validation("unsupported grant_type".into()));
    }

    let client = state
        .db
        .find_oauth_client(&req.client_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid client credentials".into()))?;

    if client.status != crate::models::OAuthClientStatus::Active {
        return Err(AppError::Unauthorized("client revoked".into()));
    }
    if !crypto::verify_password(&req.client_secret, &client.client_secret_hash)? {
        return Err(AppError::Unauthorized("invalid client credentials".into()));
    }

    let issued = state
        .jwt
        .issue_oauth_token(client.id, client.org_id, &client.scopes, client.token_ttl_secs)?;
    crate::services::audit::record_jwt_issued("kyc-gateway", "HS256", true);
    Ok(Json(Envelope::new(issued)))
}

fn random_client_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    hex::encode(bytes)
}

fn random_client_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 24] = rng.gen();
    hex::encode(bytes)
}
