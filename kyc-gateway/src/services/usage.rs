//! Usage meter & aggregator (C11): per-request events are enqueued on
//! the request path, then drained in batches by a background consumer
//! and folded into `UsageLog` plus the day-bucketed aggregate tables.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{bucket_day, UsageDailyBucket, UsageEvent};
use crate::store::KeyedStore;

use super::db::{DailyKeyVal, Database};

const QUEUE_KEY: &str = "usage:events";
const QUEUE_TTL_SECS: u64 = 24 * 3600;

#[derive(Clone)]
pub struct UsageMeter {
    store: Arc<dyn KeyedStore>,
    db: Database,
}

impl UsageMeter {
    pub fn new(store: Arc<dyn KeyedStore>, db: Database) -> Self {
        Self { store, db }
    }

    /// Pushes one event onto the queue; on store outage falls back to a
    /// direct `UsageLog` write so no event is dropped.
    pub async fn record(&self, event: UsageEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialise usage event");
                return;
            }
        };
        if let Err(e) = self.store.lpush_with_expire(QUEUE_KEY, &payload, QUEUE_TTL_SECS).await {
            tracing::warn!(error = %e, "usage queue push failed, writing usage log directly");
            if let Err(e) = self.db.insert_usage_logs(std::slice::from_ref(&event)).await {
                tracing::error!(error = %e, "direct usage log fallback also failed");
            }
        }
    }

    /// Blocking-pop-with-timeout drain; returns up to `max` raw payloads.
    pub async fn pop_batch(&self, max: usize, timeout_secs: u64) -> Result<Vec<String>, AppError> {
        let batch = self.store.brpop_batch(QUEUE_KEY, max, timeout_secs).await?;
        Ok(batch)
    }
}

/// Decodes a batch of raw queue payloads, skipping (and logging) any
/// that fail to parse rather than losing the whole flush.
pub fn decode_batch(raw: &[String]) -> Vec<UsageEvent> {
    raw.iter()
        .filter_map(|p| match serde_json::from_str::<UsageEvent>(p) {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed usage event");
                None
            }
        })
        .collect()
}

/// Applies one flushed batch: inserts raw `UsageLog` rows, bumps the
/// per-org running counter, then computes and upserts every grouped
/// daily delta in a single pass over the batch.
pub async fn flush_batch(db: &Database, events: &[UsageEvent]) -> Result<(), AppError> {
    if events.is_empty() {
        return Ok(());
    }

    db.insert_usage_logs(events).await?;

    let (success, failed) = events.iter().fold((0i64, 0i64), |(s, f), e| {
        if e.success() {
            (s + 1, f)
        } else {
            (s, f + 1)
        }
    });
    for (org_id, (s, f)) in group_by_org(events) {
        db.bump_usage_metrics(org_id, s, f).await?;
    }
    let _ = (success, failed); // totals already folded per-org above

    apply_daily_groups(db, events).await
}

async fn apply_daily_groups(db: &Database, events: &[UsageEvent]) -> Result<(), AppError> {
    let mut by_org_day: HashMap<(Uuid, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_user_day: HashMap<(Uuid, Uuid, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_service_day: HashMap<(Uuid, &'static str, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_endpoint_day: HashMap<(Uuid, String, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_key_day: HashMap<(Uuid, Uuid, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_key_user_day: HashMap<(Uuid, Uuid, Uuid, NaiveDate), UsageDailyBucket> = HashMap::new();
    let mut by_org_client_day: HashMap<(Uuid, Uuid, NaiveDate), UsageDailyBucket> = HashMap::new();

    for e in events {
        let day = bucket_day(e.created_at);
        let success = e.success();

        by_org_day.entry((e.org_id, day)).or_default().record(success);
        by_org_service_day
            .entry((e.org_id, e.service_bucket(), day))
            .or_default()
            .record(success);
        by_org_endpoint_day
            .entry((e.org_id, e.endpoint.clone(), day))
            .or_default()
            .record(success);

        if let Some(actor) = e.actor_user_id.or(e.user_id) {
            by_org_user_day.entry((e.org_id, actor, day)).or_default().record(success);
            if let Some(key_id) = e.api_key_id {
                by_org_key_user_day
                    .entry((e.org_id, key_id, actor, day))
                    .or_default()
                    .record(success);
            }
        }
        if let Some(key_id) = e.api_key_id {
            by_org_key_day.entry((e.org_id, key_id, day)).or_default().record(success);
        }
        if let Some(client_id) = e.oauth_client_id {
            by_org_client_day
                .entry((e.org_id, client_id, day))
                .or_default()
                .record(success);
        }
    }

    for ((org, day), b) in by_org_day {
        db.upsert_daily_bucket("usage_daily", &["org_id"], vec![DailyKeyVal::Uuid(org)], day, b.success, b.failed)
            .await?;
    }
    for ((org, actor, day), b) in by_org_user_day {
        db.upsert_daily_bucket(
            "usage_daily_user",
            &["org_id", "user_id"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Uuid(actor)],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }
    for ((org, service, day), b) in by_org_service_day {
        db.upsert_daily_bucket(
            "usage_daily_service",
            &["org_id", "service"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Text(service.to_string())],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }
    for ((org, endpoint, day), b) in by_org_endpoint_day {
        db.upsert_daily_bucket(
            "usage_daily_endpoint",
            &["org_id", "endpoint"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Text(endpoint)],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }
    for ((org, key, day), b) in by_org_key_day {
        db.upsert_daily_bucket(
            "usage_daily_key",
            &["org_id", "api_key_id"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Uuid(key)],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }
    for ((org, key, user, day), b) in by_org_key_user_day {
        db.upsert_daily_bucket(
            "usage_daily_key_user",
            &["org_id", "api_key_id", "user_id"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Uuid(key), DailyKeyVal::Uuid(user)],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }
    for ((org, client, day), b) in by_org_client_day {
        db.upsert_daily_bucket(
            "usage_daily_client",
            &["org_id", "oauth_client_id"],
            vec![DailyKeyVal::Uuid(org), DailyKeyVal::Uuid(client)],
            day,
            b.success,
            b.failed,
        )
        .await?;
    }

    Ok(())
}

fn group_by_org(events: &[UsageEvent]) -> HashMap<Uuid, (i64, i64)> {
    let mut out: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for e in events {
        let entry = out.entry(e.org_id).or_insert((0, 0));
        if e.success() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(org: Uuid, status: u16) -> UsageEvent {
        UsageEvent {
            id: Uuid::new_v4(),
            org_id: org,
            api_key_id: None,
            user_id: None,
            api_key_owner_id: None,
            actor_user_id: None,
            oauth_client_id: None,
            endpoint: "/api/v1/kyc/ocr".into(),
            status_code: status,
            request_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn groups_by_org_preserve_batch_total() {
        let org = Uuid::new_v4();
        let events = vec![event(org, 200), event(org, 200), event(org, 500)];
        let grouped = group_by_org(&events);
        let (s, f) = grouped[&org];
        assert_eq!(s, 2);
        assert_eq!(f, 1);
    }

    #[test]
    fn decode_batch_skips_malformed_entries() {
        let org = Uuid::new_v4();
        let good = serde_json::to_string(&event(org, 200)).unwrap();
        let raw = vec![good, "not json".to_string()];
        let decoded = decode_batch(&raw);
        assert_eq!(decoded.len(), 1);
    }
}
