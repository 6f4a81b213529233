use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single metering record produced once per processed request. Pushed
/// onto the `usage:events` queue; on store outage the meter middleware
/// falls back to writing a [`UsageLog`] row directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: Uuid,
    pub org_id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub api_key_owner_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub oauth_client_id: Option<Uuid>,
    pub endpoint: String,
    pub status_code: u16,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn success(&self) -> bool {
        self.status_code < 400
    }

    /// Service derived from path (`ocr`, `face_verify`, `liveness`, else
    /// `other`) — the org×service×day grouping key for daily rollups.
    pub fn service_bucket(&self) -> &'static str {
        if self.endpoint.contains("/kyc/ocr") {
            "ocr"
        } else if self.endpoint.contains("/face") {
            "face_verify"
        } else if self.endpoint.contains("/liveness") {
            "liveness"
        } else {
            "other"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageLog {
    pub id: Uuid,
    pub org_id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub oauth_client_id: Option<Uuid>,
    pub endpoint: String,
    pub status_code: i32,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// Day-bucketed success/failed/total delta, computed in a single pass
/// over a flushed batch and applied as an additive upsert.
#[derive(Debug, Clone, Default)]
pub struct UsageDailyBucket {
    pub success: i64,
    pub failed: i64,
}

impl UsageDailyBucket {
    pub fn total(&self) -> i64 {
        self.success + self.failed
    }

    pub fn record(&mut self, success: bool) {
        if success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub fn bucket_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
