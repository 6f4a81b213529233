//! Liveness/readiness surfaces (C12, C14): plain health, the bidirectional
//! heartbeat summary, the gateway-verified security heartbeat, and the
//! Prometheus scrape target.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::middleware::gateway_trust::KongContext;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.health_check().await.is_ok();
    let store_ok = state.store.health_check().await.is_ok();
    let status = if db_ok && store_ok { "ok" } else { "degraded" };
    let code = if db_ok && store_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.config.service_name,
            "version": state.config.service_version,
            "database": db_ok,
            "store": store_ok,
        })),
    )
}

#[derive(Debug, Serialize)]
struct HeartbeatSummary {
    healthy: bool,
    consecutive_failures: u32,
    last_probe_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn heartbeat(State(state): State<AppState>) -> impl IntoResponse {
    let hb = state.heartbeat.clone();
    Json(HeartbeatSummary {
        healthy: hb.is_healthy(),
        consecutive_failures: hb.consecutive_failures(),
        last_probe_at: hb.last_probe_at(),
    })
}

/// Requires a verified gateway context (attached by
/// [`crate::middleware::gateway_trust::verify_inbound`] on this route)
/// so only the upstream gateway, not a direct caller, can see it.
pub async fn security_heartbeat(
    kong: axum::extract::Extension<KongContext>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hb = state.heartbeat.clone();
    Json(json!({
        "healthy": hb.is_healthy(),
        "consecutive_failures": hb.consecutive_failures(),
        "last_probe_at": hb.last_probe_at(),
        "kong_service": kong.0.kong_service,
        "kong_verified": kong.0.kong_verified,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}
