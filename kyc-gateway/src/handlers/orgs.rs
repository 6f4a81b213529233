//! Organization console surface: current org, member roster, invites,
//! plan changes. Each handler layers a [`Authenticated`] extraction with
//! an explicit [`require_permission`] call per spec §4.6 rule 3.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::authz::require_permission;
use crate::middleware::Authenticated;
use crate::models::{Invitation, OrgRole, Organization, OrganizationMember, Permission, Plan};
use crate::AppState;

use super::Envelope;

pub async fn current(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Organization>>, AppError> {
    require_permission(&ctx, Permission::OrgRead)?;
    let org = state
        .db
        .find_org(ctx.org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("organization not found".into()))?;
    Ok(Json(Envelope::new(org)))
}

pub async fn members(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<OrganizationMember>>>, AppError> {
    require_permission(&ctx, Permission::OrgRead)?;
    let members = state.db.list_members(ctx.org_id).await?;
    Ok(Json(Envelope::new(members)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email)]
    pub email: String,
    pub role: OrgRole,
}

pub async fn invite(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Json(req): Json<InviteRequest>,
) -> Result<Json<Envelope<Invitation>>, AppError> {
    require_permission(&ctx, Permission::TeamInvite)?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let inviter = ctx
        .user_id
        .ok_or_else(|| AppError::Forbidden("only console-authenticated users may invite".into()))?;
    let token = uuid::Uuid::new_v4().to_string();
    let token_hash = crate::crypto::sha256_hex(&token);
    let expires_at = chrono::Utc::now() + chrono::Duration::days(7);

    let invitation = state
        .db
        .insert_invitation(ctx.org_id, &req.email, req.role, &token_hash, inviter, expires_at)
        .await?;
    Ok(Json(Envelope::new(invitation)))
}

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub plan_id: Plan,
}

pub async fn change_plan(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Json(req): Json<PlanChangeRequest>,
) -> Result<Json<Envelope<Organization>>, AppError> {
    require_permission(&ctx, Permission::BillingWrite)?;
    let org = state.db.update_org_plan(ctx.org_id, req.plan_id).await?;
    Ok(Json(Envelope::new(org)))
}
