//! KYC Gateway entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use kyc_gateway::config::Config;
use kyc_gateway::services::heartbeat::HeartbeatLoop;
use kyc_gateway::services::{AuditService, Database, JwtService, QuotaEngine, UsageMeter, VendorClient};
use kyc_gateway::store::{KeyedStore, RedisStore};
use kyc_gateway::{build_router, run_quota_resetter, run_usage_consumer, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "starting kyc-gateway"
    );

    let pool = kyc_gateway::db::create_pool(&config.database).await?;
    kyc_gateway::db::run_migrations(&pool, config.database.auto_migrate).await?;
    let db = Database::new(pool);

    let store: Arc<dyn KeyedStore> = Arc::new(RedisStore::connect(&config.store.url()).await?);

    let jwt = JwtService::new(config.security.jwt_secret.clone(), config.security.jwt_expiration_minutes);
    let usage = UsageMeter::new(store.clone(), db.clone());
    let quota = QuotaEngine::new(db.clone());
    let audit = AuditService::new(db.clone());
    let vendor = VendorClient::new(config.vendors.clone());

    let heartbeat = Arc::new(HeartbeatLoop::new(
        config.port,
        config.security.kong_shared_secret.clone(),
        config.security.service_secret_key.clone(),
        config.service_name.clone(),
    ));
    heartbeat.on_health_change(Arc::new(|healthy| {
        if healthy {
            tracing::info!("gateway-trust self-probe recovered");
        } else {
            tracing::error!("gateway-trust self-probe failing: Kong/service HMAC link unhealthy");
        }
    }));

    let recorder = PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        store,
        jwt,
        usage: usage.clone(),
        quota: quota.clone(),
        audit,
        heartbeat: heartbeat.clone(),
        vendor,
        metrics_handle: recorder,
    };

    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let heartbeat_task = tokio::spawn(heartbeat.run(shutdown_rx.clone()));
    let quota_resetter_task = tokio::spawn(run_quota_resetter(quota, shutdown_rx.clone()));
    let usage_consumer_task = tokio::spawn(run_usage_consumer(usage, db, shutdown_rx.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("http server stopped, draining background tasks");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(heartbeat_task, quota_resetter_task, usage_consumer_task);

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }
}

/// JSON logging for the PLG stack; exports traces to the configured
/// OTLP collector when one is set, falling back to JSON-only otherwise.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if let Some(ref otlp_endpoint) = config.monitoring.otlp_endpoint {
        let otlp_exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(otlp_endpoint);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(otlp_exporter)
            .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", config.service_version.clone()),
            ])))
            .install_batch(runtime::Tokio)
        {
            Ok(tracer) => {
                let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(telemetry)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_file(true)
                            .with_line_number(true)
                            .with_target(true)
                            .json()
                            .flatten_event(true),
                    )
                    .init();
                return;
            }
            Err(e) => {
                eprintln!(
                    "failed to initialize OTLP tracer (endpoint: {}): {}. falling back to JSON-only logging",
                    otlp_endpoint, e
                );
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .json()
                .flatten_event(true),
        )
        .init();
}
