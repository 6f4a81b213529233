//! PostgreSQL connection pool lifecycle (C3 half of the persistence
//! layer that the services::Database query layer sits on top of).

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// Create a PostgreSQL connection pool per spec §5's resource model:
/// max 25 open, 5 idle, 5-minute lifetime (the teacher's own defaults;
/// the config layer lets an operator override `max_open`/`max_idle`).
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(host = %config.host, db = %config.name, "connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_open)
        .min_connections(config.max_idle)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(300))
        .connect(&config.url())
        .await?;

    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Bootstraps the schema when `KYC_DB_AUTO_MIGRATE` is enabled (C4).
/// Disabled by default in production deployments that run migrations
/// out-of-band.
pub async fn run_migrations(pool: &PgPool, enabled: bool) -> Result<(), sqlx::migrate::MigrateError> {
    if !enabled {
        tracing::info!("auto-migrate disabled, skipping schema bootstrap");
        return Ok(());
    }
    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations completed");
    Ok(())
}
