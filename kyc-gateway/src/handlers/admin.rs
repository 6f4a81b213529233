//! Platform-admin console surface. Gated by [`AdminAuthenticated`],
//! which additionally requires `is_platform_admin=true` on top of the
//! ordinary JWT resolution.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::AdminAuthenticated;
use crate::models::{AuditLog, Organization, User};
use crate::AppState;

use super::Envelope;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_users(
    AdminAuthenticated(_ctx): AdminAuthenticated,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Envelope<Vec<User>>>, AppError> {
    let users = state.db.list_users(page.limit, page.offset).await?;
    Ok(Json(Envelope::new(users)))
}

pub async fn list_organizations(
    AdminAuthenticated(_ctx): AdminAuthenticated,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Envelope<Vec<Organization>>>, AppError> {
    let orgs = state.db.list_orgs(page.limit, page.offset).await?;
    Ok(Json(Envelope::new(orgs)))
}

pub async fn list_audit_logs(
    AdminAuthenticated(_ctx): AdminAuthenticated,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Envelope<Vec<AuditLog>>>, AppError> {
    let logs = state.audit.list(page.limit, page.offset).await?;
    Ok(Json(Envelope::new(logs)))
}
