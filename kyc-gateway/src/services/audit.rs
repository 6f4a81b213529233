//! Audit & metrics (C14): structured audit rows plus the counters and
//! histograms referenced throughout the auth/quota/heartbeat/token
//! pipeline.

use uuid::Uuid;

use crate::error::AppError;

use super::db::Database;

#[derive(Clone)]
pub struct AuditService {
    db: Database,
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        request_id: &str,
        user_id: Option<Uuid>,
        org_id: Option<Uuid>,
        action: &str,
        resource: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        status: &str,
        message: Option<&str>,
    ) {
        if let Err(e) = self
            .db
            .insert_audit_log(request_id, user_id, org_id, action, resource, client_ip, user_agent, status, message)
            .await
        {
            tracing::error!(error = %e, request_id, "failed to persist audit log row");
        }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<crate::models::AuditLog>, AppError> {
        self.db.list_audit_logs(limit, offset).await
    }
}

/// Records an auth-resolution failure with the labels every resolver
/// (JWT, API key, OAuth2 client-credentials, admin JWT) reports on.
pub fn record_auth_failure(auth_type: &str, reason: &str, client_ip: &str) {
    metrics::counter!(
        "auth_failures_total",
        "auth_type" => auth_type.to_string(),
        "reason" => reason.to_string(),
        "client_ip" => client_ip.to_string(),
    )
    .increment(1);
}

pub fn record_business_error(operation: &str, error_type: &str) {
    metrics::counter!(
        "business_operation_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

pub fn record_jwt_issued(issuer: &str, algorithm: &str, success: bool) {
    metrics::counter!(
        "jwt_tokens_issued_total",
        "issuer" => issuer.to_string(),
        "algorithm" => algorithm.to_string(),
        "success" => success.to_string(),
    )
    .increment(1);
}

pub fn record_heartbeat(healthy: bool, duration_secs: f64) {
    metrics::gauge!("heartbeat_healthy").set(if healthy { 1.0 } else { 0.0 });
    metrics::histogram!("heartbeat_duration_seconds").record(duration_secs);
}
