//! Gateway-trust middleware (C5): bidirectional HMAC between the
//! upstream API gateway and this service. Verifies inbound signatures,
//! detects bypass attempts, and signs every outbound response on a
//! gateway-protected route.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto;
use crate::error::AppError;

const HEADER_KONG_SIGNATURE: &str = "x-kong-signature";
const HEADER_KONG_TIMESTAMP: &str = "x-kong-timestamp";
const HEADER_KONG_SERVICE: &str = "x-kong-service";
const HEADER_FORWARDED_BY_GATEWAY: &str = "x-forwarded-by-gateway";

const MAX_SKEW: chrono::Duration = chrono::Duration::minutes(5);

#[derive(Debug, Clone)]
pub struct KongContext {
    pub kong_service: String,
    pub kong_verified: bool,
}

/// Verifies `X-Kong-Signature` / `X-Kong-Timestamp` / `X-Kong-Service`
/// against the shared secret. On success, attaches a [`KongContext`] to
/// the request and lets it proceed; on any failure, returns the
/// matching `KONG_*` error without running the handler.
pub async fn verify_inbound(
    State(shared_secret): State<std::sync::Arc<str>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = req.headers().clone();
    let path = req.uri().path().to_string();

    let signature = headers.get(HEADER_KONG_SIGNATURE).and_then(|v| v.to_str().ok());
    let timestamp = headers.get(HEADER_KONG_TIMESTAMP).and_then(|v| v.to_str().ok());
    let service = headers.get(HEADER_KONG_SERVICE).and_then(|v| v.to_str().ok());

    // Bypass is specifically "neither the signature header nor a
    // forwarded-by-gateway marker is present" — a caller missing only
    // the timestamp or service header, while still presenting a
    // signature, is a malformed gateway call, not a bypass.
    if signature.is_none() && !headers.contains_key(HEADER_FORWARDED_BY_GATEWAY) {
        tracing::warn!(path = %path, "KONG_BYPASS_ATTEMPT: no gateway signature or forwarded marker present on protected route");
        metrics::counter!("kong_bypass_attempts_total").increment(1);
        return Err(AppError::Forbidden("ACCESS_DENIED".into()));
    }

    let (signature, timestamp, service) = match (signature, timestamp, service) {
        (Some(s), Some(t), Some(svc)) => (s, t, svc),
        _ => return Err(AppError::MissingHeader("KONG_AUTH_MISSING".into())),
    };

    let ts: DateTime<Utc> = timestamp
        .parse()
        .map_err(|_| AppError::Unauthorized("KONG_TIMESTAMP_EXPIRED".into()))?;
    let now = Utc::now();
    if (now - ts).abs() > MAX_SKEW {
        metrics::counter!("timestamp_expired_total").increment(1);
        return Err(AppError::Unauthorized("KONG_TIMESTAMP_EXPIRED".into()));
    }

    let message = format!("{service}:{path}:{timestamp}:{shared_secret}");
    if !crypto::hmac_verify_b64(&shared_secret, &message, signature)? {
        return Err(AppError::Unauthorized("KONG_SIGNATURE_INVALID".into()));
    }

    req.extensions_mut().insert(KongContext {
        kong_service: service.to_string(),
        kong_verified: true,
    });

    Ok(next.run(req).await)
}

/// Signs every response on a gateway-protected route with
/// `X-Service-Signature`/`X-Service-Timestamp`/`X-Service-Name`/`X-Service-Nonce`.
pub async fn sign_outbound(
    State((service_secret, service_name)): State<(std::sync::Arc<str>, std::sync::Arc<str>)>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let mut response = next.run(req).await;

    let ts = Utc::now().to_rfc3339();
    let nonce = Uuid::new_v4().to_string();
    let message = format!("{service_name}:{path}:{method}:{ts}:{nonce}");
    let Ok(signature) = crypto::hmac_sign_b64(&service_secret, &message) else {
        return response;
    };

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&signature) {
        headers.insert("x-service-signature", v);
    }
    if let Ok(v) = HeaderValue::from_str(&ts) {
        headers.insert("x-service-timestamp", v);
    }
    if let Ok(v) = HeaderValue::from_str(&service_name) {
        headers.insert("x-service-name", v);
    }
    if let Ok(v) = HeaderValue::from_str(&nonce) {
        headers.insert("x-service-nonce", v);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_skew_boundary_is_inclusive_at_five_minutes() {
        let now = Utc::now();
        let exactly_five = now - chrono::Duration::minutes(5);
        assert!((now - exactly_five).abs() <= MAX_SKEW);
        let over_five = now - (chrono::Duration::minutes(5) + chrono::Duration::milliseconds(1));
        assert!((now - over_five).abs() > MAX_SKEW);
    }
}
