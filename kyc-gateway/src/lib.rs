//! KYC Gateway
//!
//! Multi-tenant identity-verification gateway sitting behind an upstream
//! API gateway (Kong). Provides:
//! - Dual-plane authentication: gateway-trust HMAC plus direct
//!   JWT/API-key/OAuth2 client-credentials auth for console callers
//! - Per-org quota and per-IP rate limiting
//! - Usage metering, aggregated into day-bucketed rollups
//! - Request/response journalling with PII redaction
//! - Bidirectional heartbeat against the gateway-trust link

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::error::AppError;
use crate::services::{AuditService, Database, JwtService, QuotaEngine, UsageMeter, VendorClient};
use crate::store::KeyedStore;

/// Shared state threaded through every handler and middleware layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub store: Arc<dyn KeyedStore>,
    pub jwt: JwtService,
    pub usage: UsageMeter,
    pub quota: QuotaEngine,
    pub audit: AuditService,
    pub heartbeat: Arc<services::heartbeat::HeartbeatLoop>,
    pub vendor: VendorClient,
    pub metrics_handle: PrometheusHandle,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl FromRef<AppState> for Arc<dyn KeyedStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

/// Builds the full HTTP surface: console auth/admin/org/key routes,
/// the KYC dispatch surface, and the operational endpoints, layered
/// with the ambient middleware stack in teacher order — request id and
/// security headers outermost, then metrics/rate-limit/idempotency/observe,
/// idempotency wrapping observe so a cached replay short-circuits before
/// the usage meter ever fires, with gateway-trust applied only to the
/// routes Kong actually fronts.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me));

    let token_routes = Router::new().route("/generate", post(handlers::token::generate));

    let key_routes = Router::new()
        .route("/", post(handlers::keys::create).get(handlers::keys::list))
        .route("/:id", axum::routing::delete(handlers::keys::revoke));

    let oauth_routes = Router::new()
        .route("/clients", post(handlers::oauth::create).get(handlers::oauth::list))
        .route("/clients/:id", axum::routing::delete(handlers::oauth::revoke))
        .route("/token", post(handlers::oauth::token));

    let org_routes = Router::new()
        .route("/current", get(handlers::orgs::current))
        .route("/members", get(handlers::orgs::members))
        .route("/invite", post(handlers::orgs::invite))
        .route("/plan", post(handlers::orgs::change_plan));

    let admin_routes = Router::new()
        .route("/users", get(handlers::admin::list_users))
        .route("/organizations", get(handlers::admin::list_organizations))
        .route("/audit-logs", get(handlers::admin::list_audit_logs));

    let kyc_routes = Router::new()
        .route("/ocr", post(handlers::kyc::ocr))
        .route("/face/verify", post(handlers::kyc::face_verify))
        .route("/face/search", post(handlers::kyc::face_search))
        .route("/liveness/ws", get(handlers::kyc::liveness_ws))
        .route("/verify", post(handlers::kyc::verify))
        .route("/status/:id", get(handlers::kyc::status))
        .layer(axum_middleware::from_fn_with_state(
            (service_secret(&state), service_name(&state)),
            middleware::gateway_trust::sign_outbound,
        ))
        .layer(axum_middleware::from_fn_with_state(
            kong_shared_secret(&state),
            middleware::gateway_trust::verify_inbound,
        ));

    let security_heartbeat_route = Router::new()
        .route("/security-heartbeat", get(handlers::health::security_heartbeat))
        .layer(axum_middleware::from_fn_with_state(
            (service_secret(&state), service_name(&state)),
            middleware::gateway_trust::sign_outbound,
        ))
        .layer(axum_middleware::from_fn_with_state(
            kong_shared_secret(&state),
            middleware::gateway_trust::verify_inbound,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/heartbeat", get(handlers::health::heartbeat))
        .route("/metrics", get(handlers::health::metrics))
        .merge(security_heartbeat_route)
        .nest("/auth", auth_routes)
        .nest("/token", token_routes)
        .nest("/keys", key_routes)
        .nest("/oauth", oauth_routes)
        .nest("/orgs", org_routes)
        .nest("/admin", admin_routes)
        .nest("/kyc", kyc_routes)
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::observe::observe))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::idempotency::idempotency,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.store.clone(),
            middleware::rate_limit::per_ip_rate_limit,
        ))
        .layer(axum_middleware::from_fn(middleware::envelope::fill_error_envelope))
        .layer(axum_middleware::from_fn(service_core::middleware::metrics::metrics_middleware))
        .layer(axum_middleware::from_fn(
            service_core::middleware::security_headers::security_headers_middleware,
        ))
        .layer(axum_middleware::from_fn(service_core::middleware::tracing::request_id_middleware))
        .layer(cors_layer(&state.config));

    app
}

fn kong_shared_secret(state: &AppState) -> Arc<str> {
    Arc::from(state.config.security.kong_shared_secret.as_str())
}

fn service_secret(state: &AppState) -> Arc<str> {
    Arc::from(state.config.security.service_secret_key.as_str())
}

fn service_name(state: &AppState) -> Arc<str> {
    Arc::from(state.config.service_name.as_str())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Convenience re-export so `main.rs` doesn't need to know the module
/// path for the one-shot quota resetter and usage-flush loop.
pub async fn run_quota_resetter(quota: QuotaEngine, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = quota.reset_due().await {
                    tracing::warn!(error = %err, "quota reset sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("quota resetter shutting down");
                    return;
                }
            }
        }
    }
}

/// Drains the usage-event queue in batches and flushes them to the
/// database. Runs until `shutdown` fires, then performs one final
/// drain so in-flight events aren't lost (spec §5).
pub async fn run_usage_consumer(usage: UsageMeter, db: Database, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    const BATCH_SIZE: usize = 200;
    const WAIT_SECS: u64 = 5;

    loop {
        tokio::select! {
            batch = usage.pop_batch(BATCH_SIZE, WAIT_SECS) => {
                flush_raw_batch(&db, batch).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("usage consumer draining before shutdown");
                    let remainder = usage.pop_batch(BATCH_SIZE, 0).await;
                    flush_raw_batch(&db, remainder).await;
                    return;
                }
            }
        }
    }
}

async fn flush_raw_batch(db: &Database, batch: Result<Vec<String>, AppError>) {
    let raw = match batch {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "usage queue drain failed");
            return;
        }
    };
    if raw.is_empty() {
        return;
    }
    let events = services::usage::decode_batch(&raw);
    if let Err(err) = services::usage::flush_batch(db, &events).await {
        tracing::warn!(error = %err, "usage batch flush failed");
    }
}
