use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Full process configuration, loaded once at startup from environment
/// variables prefixed `KYC_` (a handful of cross-cutting vars, e.g.
/// `ENVIRONMENT` and `LOG_LEVEL`, are unprefixed for parity with the
/// rest of the fleet).
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
    pub vendors: VendorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("invalid environment: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl: bool,
    pub max_open: u32,
    pub max_idle: u32,
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        let sslmode = if self.ssl { "require" } else { "disable" };
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, sslmode
        )
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub pool_size: u32,
    pub min_idle: u32,
    pub retries: u32,
    pub connect_timeout_secs: u64,
}

impl StoreConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(pass) if !pass.is_empty() => {
                format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db)
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    pub encryption_key: String,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub kong_shared_secret: String,
    pub service_secret_key: String,
    pub allowed_origins: Vec<String>,
    /// Gates `POST /token/generate`'s caller-supplied `secret` override,
    /// the forge-any-claims test aid spec.md §9 requires disabled outside dev.
    pub allow_test_token_secret_override: bool,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub ingest_dir: String,
}

#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub ocr_base_url: String,
    pub face_base_url: String,
    pub liveness_base_url: String,
    pub timeout_secs: u64,
    pub liveness_timeout_secs: u64,
    pub max_retries: u32,
    pub use_mock: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Config(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let config = Config {
            environment: environment.clone(),
            service_name: get_env("KYC_SERVICE_NAME", Some("kyc-gateway"), is_prod)?,
            service_version: get_env("KYC_SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("KYC_PORT", Some("8080"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| AppError::Config(anyhow::anyhow!(e)))?,
            database: DatabaseConfig {
                host: get_env("KYC_DB_HOST", Some("localhost"), is_prod)?,
                port: parse_env("KYC_DB_PORT", "5432", is_prod)?,
                user: get_env("KYC_DB_USER", Some("postgres"), is_prod)?,
                password: get_env("KYC_DB_PASSWORD", None, is_prod)?,
                name: get_env("KYC_DB_NAME", Some("kyc_gateway"), is_prod)?,
                ssl: parse_env("KYC_DB_SSL", "false", is_prod)?,
                max_open: parse_env("KYC_DB_MAX_OPEN", "25", is_prod)?,
                max_idle: parse_env("KYC_DB_MAX_IDLE", "5", is_prod)?,
                auto_migrate: parse_env("KYC_DB_AUTO_MIGRATE", "false", is_prod)?,
            },
            store: StoreConfig {
                host: get_env("KYC_STORE_HOST", Some("localhost"), is_prod)?,
                port: parse_env("KYC_STORE_PORT", "6379", is_prod)?,
                password: env::var("KYC_STORE_PASSWORD").ok(),
                db: parse_env("KYC_STORE_DB", "0", is_prod)?,
                pool_size: parse_env("KYC_STORE_POOL", "10", is_prod)?,
                min_idle: parse_env("KYC_STORE_MIN_IDLE", "1", is_prod)?,
                retries: parse_env("KYC_STORE_RETRIES", "3", is_prod)?,
                connect_timeout_secs: parse_env("KYC_STORE_CONNECT_TIMEOUT_SECS", "5", is_prod)?,
            },
            security: SecurityConfig {
                jwt_secret: get_env("KYC_JWT_SECRET", None, is_prod)?,
                jwt_expiration_minutes: parse_env("KYC_JWT_EXPIRATION_MINUTES", "60", is_prod)?,
                encryption_key: get_env("KYC_ENCRYPTION_KEY", None, is_prod)?,
                rate_limit_per_second: parse_env("KYC_RATE_LIMIT_PER_SECOND", "300", is_prod)?,
                rate_limit_burst: parse_env("KYC_RATE_LIMIT_BURST", "50", is_prod)?,
                kong_shared_secret: get_env("KYC_KONG_SHARED_SECRET", None, is_prod)?,
                service_secret_key: get_env("KYC_SERVICE_SECRET_KEY", None, is_prod)?,
                allowed_origins: get_env("KYC_ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_test_token_secret_override: !is_prod
                    && parse_env("KYC_ALLOW_TEST_TOKEN_SECRET_OVERRIDE", "true", false)?,
            },
            monitoring: MonitoringConfig {
                metrics_enabled: parse_env("KYC_METRICS_ENABLED", "true", is_prod)?,
                otlp_endpoint: env::var("KYC_OTLP_ENDPOINT").ok(),
            },
            storage: StorageConfig {
                ingest_dir: get_env("KYC_STORAGE_INGEST_DIR", Some("./data/ingest"), is_prod)?,
            },
            vendors: VendorConfig {
                ocr_base_url: get_env("KYC_VENDOR_OCR_URL", Some("http://localhost:9101"), is_prod)?,
                face_base_url: get_env("KYC_VENDOR_FACE_URL", Some("http://localhost:9102"), is_prod)?,
                liveness_base_url: get_env(
                    "KYC_VENDOR_LIVENESS_URL",
                    Some("http://localhost:9103"),
                    is_prod,
                )?,
                timeout_secs: parse_env("KYC_VENDOR_TIMEOUT_SECS", "30", is_prod)?,
                liveness_timeout_secs: parse_env("KYC_VENDOR_LIVENESS_TIMEOUT_SECS", "60", is_prod)?,
                max_retries: parse_env("KYC_VENDOR_MAX_RETRIES", "2", is_prod)?,
                use_mock: parse_env("KYC_VENDOR_USE_MOCK", "true", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::Config(anyhow::anyhow!("KYC_PORT must be greater than 0")));
        }
        if self.security.jwt_secret.len() < 32 {
            return Err(AppError::Config(anyhow::anyhow!(
                "KYC_JWT_SECRET must be at least 32 bytes"
            )));
        }
        if self.security.encryption_key.len() != 32 {
            return Err(AppError::Config(anyhow::anyhow!(
                "KYC_ENCRYPTION_KEY must be exactly 32 bytes"
            )));
        }
        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Config(anyhow::anyhow!(
                    "wildcard CORS origin not allowed in production"
                )));
            }
            if self.security.allow_test_token_secret_override {
                return Err(AppError::Config(anyhow::anyhow!(
                    "KYC_ALLOW_TEST_TOKEN_SECRET_OVERRIDE must not be enabled in production"
                )));
            }
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(anyhow::anyhow!(format!(
                    "{key} is required in production but not set"
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(anyhow::anyhow!(format!(
                    "{key} is required but not set"
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::Config(anyhow::anyhow!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("staging".parse::<Environment>().is_err());
    }
}
