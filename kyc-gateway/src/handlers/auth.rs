//! Console authentication: register an org + owner in one transaction
//! boundary, password login, and the "who am I" profile probe.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::crypto;
use crate::error::AppError;
use crate::middleware::Authenticated;
use crate::models::{OrgRole, UserProfile};
use crate::services::audit::record_jwt_issued;
use crate::AppState;

use super::Envelope;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1))]
    pub display_name: String,
    #[validate(length(min = 1))]
    pub org_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub expires_in: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Envelope<RegisterResponse>>, AppError> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    if state.db.find_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict("an account with this email already exists".into()));
    }

    let org_id = Uuid::new_v4();
    let org = state.db.insert_org(org_id, &req.org_name, &req.email).await?;

    let password_hash = crypto::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let user = state
        .db
        .insert_user(user_id, &req.email, &password_hash, &req.display_name, org.id, OrgRole::Owner, false)
        .await?;
    state.db.insert_member(org.id, user.id, OrgRole::Owner).await?;

    let issued = state.jwt.issue_user_token(user.id, org.id)?;
    record_jwt_issued("kyc-gateway", "HS256", true);

    Ok(Json(Envelope::new(RegisterResponse {
        user: user.into(),
        access_token: issued.access_token,
        expires_in: issued.expires_in,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, AppError> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;

    if !crypto::verify_password(&req.password, &user.password_hash)? {
        record_jwt_issued("kyc-gateway", "HS256", false);
        return Err(AppError::Unauthorized("invalid email or password".into()));
    }
    if user.status != crate::models::UserStatus::Active {
        return Err(AppError::Forbidden("Account Suspended".into()));
    }

    state.db.touch_last_login(user.id).await?;
    let issued = state.jwt.issue_user_token(user.id, user.effective_org_id())?;
    record_jwt_issued("kyc-gateway", "HS256", true);

    Ok(Json(Envelope::new(LoginResponse {
        user: user.into(),
        access_token: issued.access_token,
        expires_in: issued.expires_in,
    })))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub profile: UserProfile,
    pub api_keys: Vec<crate::models::ApiKey>,
}

pub async fn me(Authenticated(ctx): Authenticated, State(state): State<AppState>) -> Result<Json<Envelope<MeResponse>>, AppError> {
    let user_id = ctx
        .user_id
        .ok_or_else(|| AppError::Forbidden("this credential is not associated with a user profile".into()))?;
    let user = state
        .db
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    let api_keys = state.db.list_user_api_keys(user_id).await?;
    Ok(Json(Envelope::new(MeResponse {
        profile: user.into(),
        api_keys,
    })))
}
