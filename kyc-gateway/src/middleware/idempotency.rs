//! Honours the `Idempotency-Key` header: a repeated request carrying the
//! same key within 24 hours replays the original response instead of
//! re-running the handler. Keyed on `idem:<key>` in the shared store,
//! independent of which caller or IP presents the key — the header
//! alone is the identity, matching how Kong forwards it unchanged.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

const TTL_SECS: u64 = 24 * 3600;
const HEADER: &str = "idempotency-key";
const REPLAY_HEADER: &str = "idempotency-replayed";

#[derive(Serialize, Deserialize)]
struct CachedResponse {
    status: u16,
    body_base64: String,
}

pub async fn idempotency(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = req
        .headers()
        .get(HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(key) = key else {
        return next.run(req).await;
    };
    let store_key = format!("idem:{key}");

    match state.store.get(&store_key).await {
        Ok(Some(raw)) => {
            if let Some(response) = decode_cached(&raw) {
                return response;
            }
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, "idempotency store lookup failed, proceeding uncached");
        }
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, 2 * 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        body_base64: encode_base64(&bytes),
    };
    if let Ok(serialized) = serde_json::to_string(&cached) {
        let store = state.store.clone();
        tokio::spawn(async move {
            if let Err(err) = store.set_ex(&store_key, &serialized, TTL_SECS).await {
                tracing::warn!(error = %err, "failed to cache idempotent response");
            }
        });
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn decode_cached(raw: &str) -> Option<Response> {
    let cached: CachedResponse = serde_json::from_str(raw).ok()?;
    let body = decode_base64(&cached.body_base64)?;
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(REPLAY_HEADER, HeaderValue::from_static("true"));
    Some(response)
}

fn encode_base64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn decode_base64(s: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_response_round_trips_through_base64() {
        let body = b"{\"ok\":true}".to_vec();
        let cached = CachedResponse {
            status: 201,
            body_base64: encode_base64(&body),
        };
        let serialized = serde_json::to_string(&cached).unwrap();
        let decoded: CachedResponse = serde_json::from_str(&serialized).unwrap();
        assert_eq!(decoded.status, 201);
        assert_eq!(decode_base64(&decoded.body_base64).unwrap(), body);
    }
}
