//! Request journal (C10) and usage metering (C11), combined into one
//! layer because both need to see the same request/response pair.
//! Journalling only applies to non-health, non-metrics routes;
//! metering applies to everything so quota-relevant traffic is always
//! counted.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::middleware::authn::best_effort_context;
use crate::models::UsageEvent;
use crate::services::redact;
use crate::AppState;

const MAX_CAPTURE_BYTES: usize = 256 * 1024;

fn is_unjournalled(path: &str) -> bool {
    path.starts_with("/health") || path == "/metrics" || path == "/heartbeat" || path == "/security-heartbeat"
}

fn is_json_content(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

fn is_multipart_content(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false)
}

pub async fn observe(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let client_ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string();
    let journal = !is_unjournalled(&path);

    let (parts, body) = req.into_parts();
    let ctx = best_effort_context(&state.db, &state.jwt, &parts).await;

    let (captured, body) = if journal && is_json_content(&parts.headers) {
        match axum::body::to_bytes(body, MAX_CAPTURE_BYTES).await {
            Ok(bytes) => (redact::sanitize_body(&bytes), Body::from(bytes)),
            Err(_) => (None, Body::empty()),
        }
    } else if journal && is_multipart_content(&parts.headers) {
        (Some(redact::binary_marker()), body)
    } else {
        (None, body)
    };

    let req = Request::from_parts(parts, body);
    finish(state, req, next, method, path, client_ip, ctx, journal, captured).await
}

#[allow(clippy::too_many_arguments)]
async fn finish(
    state: AppState,
    req: Request,
    next: Next,
    method: String,
    path: String,
    client_ip: String,
    ctx: Option<crate::services::AuthContext>,
    journal: bool,
    request_body: Option<serde_json::Value>,
) -> Response {
    let start = Instant::now();
    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as i64;
    let status = response.status().as_u16();

    let request_id = response
        .headers()
        .get(service_core::middleware::tracing::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (parts, body) = response.into_parts();
    let response_bytes = match axum::body::to_bytes(body, MAX_CAPTURE_BYTES).await {
        Ok(b) => b,
        Err(_) => axum::body::Bytes::new(),
    };
    let response = Response::from_parts(parts, Body::from(response_bytes.clone()));

    let org_id = ctx.as_ref().map(|c| c.org_id);
    let user_id = ctx.as_ref().and_then(|c| c.user_id);
    let api_key_id = ctx.as_ref().and_then(|c| c.api_key_id);
    let oauth_client_id = ctx.as_ref().and_then(|c| c.oauth_client_id);
    let actor_user_id = ctx.as_ref().and_then(|c| c.actor_user_id());
    let api_key_owner_id = ctx.as_ref().and_then(|c| c.api_key_owner_id);

    if journal {
        let response_body = redact::sanitize_response_body(&response_bytes);
        let db = state.db.clone();
        let method = method.clone();
        let path = path.clone();
        tokio::spawn(async move {
            if let Err(err) = db
                .insert_request_log(
                    org_id,
                    user_id,
                    api_key_id,
                    None,
                    &method,
                    &path,
                    status as i32,
                    latency_ms,
                    &client_ip,
                    request_body,
                    response_body,
                )
                .await
            {
                tracing::warn!(error = %err, "failed to persist request journal entry");
            }
        });
    }

    if let Some(org_id) = org_id {
        let event = UsageEvent {
            id: Uuid::new_v4(),
            org_id,
            api_key_id,
            user_id,
            api_key_owner_id,
            actor_user_id,
            oauth_client_id,
            endpoint: path,
            status_code: status,
            request_id,
            created_at: chrono::Utc::now(),
        };
        let usage = state.usage.clone();
        tokio::spawn(async move {
            usage.record(event).await;
        });
    }

    response
}
