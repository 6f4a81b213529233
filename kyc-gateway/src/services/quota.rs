//! Quota engine (C9): check-and-consume per (org, service_type), fail
//! closed on any persistence error.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{OrganizationQuota, ServiceType};

use super::db::Database;

#[derive(Clone)]
pub struct QuotaEngine {
    db: Database,
}

impl QuotaEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Consumes one unit of `service_type` quota for `org_id`. The
    /// database performs the reset-check and the atomic increment under
    /// a row lock; a persistence error here is always fatal for the
    /// request — there is no "assume granted" fallback.
    pub async fn check_and_consume(
        &self,
        org_id: Uuid,
        service_type: ServiceType,
    ) -> Result<OrganizationQuota, AppError> {
        match self.db.check_and_consume_quota(org_id, service_type).await {
            Ok(quota) => Ok(quota),
            Err(AppError::QuotaExceeded) => {
                metrics::counter!(
                    "business_operation_errors_total",
                    "operation" => operation_name(service_type),
                    "error_type" => "quota_exceeded",
                )
                .increment(1);
                Err(AppError::QuotaExceeded)
            }
            Err(other) => {
                metrics::counter!("quota_persist_errors_total").increment(1);
                Err(other)
            }
        }
    }

    /// Invoked by the background resetter on its tick.
    pub async fn reset_due(&self) -> Result<u64, AppError> {
        self.db.reset_due_quotas().await
    }
}

fn operation_name(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Ocr => "ocr",
        ServiceType::Face => "face_verify",
        ServiceType::Liveness => "liveness",
    }
}
