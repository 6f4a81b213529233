//! `POST /token/generate` (C16 test aid): mints an arbitrary JWT for
//! integration testing. `secret` is only honoured when
//! `allow_test_token_secret_override` is set, which `Config::validate`
//! refuses to allow outside dev.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::services::jwt::IssuedToken;
use crate::AppState;

use super::Envelope;

#[derive(Debug, Deserialize)]
pub struct GenerateTokenRequest {
    pub issuer: String,
    pub subject: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_expiration_secs")]
    pub expiration: i64,
    #[serde(default)]
    pub custom_claims: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_expiration_secs() -> i64 {
    3600
}

pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateTokenRequest>,
) -> Result<Json<Envelope<IssuedToken>>, AppError> {
    let issued = state.jwt.generate_test_token(
        &req.issuer,
        &req.subject,
        req.audience.as_deref(),
        req.expiration,
        req.custom_claims,
        req.algorithm.as_deref(),
        req.secret.as_deref(),
        state.config.security.allow_test_token_secret_override,
    )?;
    Ok(Json(Envelope::new(issued)))
}
