//! Per-IP fixed-window rate limiter (C8): the fallback ring behind the
//! API gateway's own global burst limiter. One pipelined INCR+EXPIRE
//! round-trip per request against the keyed store.

use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::store::KeyedStore;

const WINDOW_SECS: u64 = 1;
const DEFAULT_CEILING: i64 = 300;

pub async fn per_ip_rate_limit(
    State(store): State<Arc<dyn KeyedStore>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&req);
    let key = format!("rate_limit:{ip}");

    let count = store
        .incr_with_expire(&key, WINDOW_SECS)
        .await
        .map_err(|_| AppError::ServiceUnavailable)?;

    if count > DEFAULT_CEILING {
        return Err(AppError::RateLimited { retry_after_secs: WINDOW_SECS });
    }

    Ok(next.run(req).await)
}

/// Prefers the first `X-Forwarded-For` entry (gateway-set, trusted on
/// this deployment topology), falling back to the TCP peer address.
pub fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
