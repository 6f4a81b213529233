//! Integration tests for the gateway-trust middleware (C5): bypass
//! detection, replay/skew rejection and signature verification, built
//! against a minimal router carrying only `verify_inbound` so no
//! database or keyed store is required.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use kyc_gateway::middleware::gateway_trust::verify_inbound;
use std::sync::Arc;
use tower::util::ServiceExt;

const SHARED_SECRET: &str = "test-kong-shared-secret";

fn protected_router() -> Router {
    Router::new()
        .route("/protected", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(
            Arc::<str>::from(SHARED_SECRET),
            verify_inbound,
        ))
}

fn sign(service: &str, path: &str, ts: &str) -> String {
    let message = format!("{service}:{path}:{ts}:{SHARED_SECRET}");
    kyc_gateway::crypto::hmac_sign_b64(SHARED_SECRET, &message).unwrap()
}

#[tokio::test]
async fn bypass_without_gateway_headers_is_rejected() {
    let app = protected_router();
    let req = Request::builder().uri("/protected").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn valid_signature_within_skew_is_accepted() {
    let app = protected_router();
    let ts = chrono::Utc::now().to_rfc3339();
    let sig = sign("kyc-gateway", "/protected", &ts);

    let req = Request::builder()
        .uri("/protected")
        .header("x-kong-signature", sig)
        .header("x-kong-timestamp", ts)
        .header("x-kong-service", "kyc-gateway")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let app = protected_router();
    let ts = chrono::Utc::now().to_rfc3339();
    let mut sig = sign("kyc-gateway", "/protected", &ts);
    sig.push('x');

    let req = Request::builder()
        .uri("/protected")
        .header("x-kong-signature", sig)
        .header("x-kong-timestamp", ts)
        .header("x-kong-service", "kyc-gateway")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn timestamp_six_minutes_stale_is_rejected() {
    let app = protected_router();
    let ts = (chrono::Utc::now() - chrono::Duration::minutes(6)).to_rfc3339();
    let sig = sign("kyc-gateway", "/protected", &ts);

    let req = Request::builder()
        .uri("/protected")
        .header("x-kong-signature", sig)
        .header("x-kong-timestamp", ts)
        .header("x-kong-service", "kyc-gateway")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_signature_header_alone_is_missing_header_not_bypass() {
    let app = protected_router();
    let ts = chrono::Utc::now().to_rfc3339();

    let req = Request::builder()
        .uri("/protected")
        .header("x-kong-timestamp", ts)
        .header("x-kong-service", "kyc-gateway")
        .header("x-forwarded-by-gateway", "1")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signature_present_without_timestamp_is_missing_header_not_bypass() {
    let app = protected_router();

    let req = Request::builder()
        .uri("/protected")
        .header("x-kong-signature", "deadbeef")
        .header("x-kong-service", "kyc-gateway")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
