//! Integration test for the per-IP fixed-window rate limiter (C8): the
//! 300th request in a window is allowed, the 301st is rejected with
//! `429` and a `Retry-After` header, built against a minimal router
//! carrying only `per_ip_rate_limit` over a `MockStore` so no live
//! Redis is required.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use kyc_gateway::middleware::rate_limit::per_ip_rate_limit;
use kyc_gateway::store::{KeyedStore, MockStore};
use std::sync::Arc;
use tower::util::ServiceExt;

fn limited_router(store: Arc<dyn KeyedStore>) -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .layer(axum::middleware::from_fn_with_state(store, per_ip_rate_limit))
}

fn request_from(ip: &str) -> Request<Body> {
    Request::builder()
        .uri("/ping")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn three_hundredth_request_in_window_is_allowed_301st_is_limited() {
    let store: Arc<dyn KeyedStore> = Arc::new(MockStore::new());

    for n in 1..=300 {
        let app = limited_router(store.clone());
        let res = app.oneshot(request_from("203.0.113.9")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "request {n} should be allowed");
    }

    let app = limited_router(store.clone());
    let res = app.oneshot(request_from("203.0.113.9")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().get(axum::http::header::RETRY_AFTER).is_some());
}

#[tokio::test]
async fn separate_ips_have_independent_counters() {
    let store: Arc<dyn KeyedStore> = Arc::new(MockStore::new());

    for _ in 0..300 {
        let app = limited_router(store.clone());
        app.oneshot(request_from("198.51.100.1")).await.unwrap();
    }

    // a different IP starts its own fresh window and is not limited.
    let app = limited_router(store.clone());
    let res = app.oneshot(request_from("198.51.100.2")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
