use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error envelope rendered on every non-2xx response. `request_id`, `path`
/// and `method` are blank here and filled in by the envelope middleware,
/// which is the only place that has both the response and the
/// originating request in hand.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: i32,
    pub message: String,
    pub error: String,
    pub timestamp: i64,
    pub request_id: String,
    pub path: String,
    pub method: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid parameter: {0}")]
    Validation(String),

    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("database error: {0}")]
    Database(anyhow::Error),

    #[error("store error: {0}")]
    Store(anyhow::Error),

    #[error("config error: {0}")]
    Config(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),

    #[error("limiter unavailable")]
    ServiceUnavailable,
}

impl AppError {
    /// Numeric code buckets for the error envelope.
    fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) => 1000,
            AppError::Unauthorized(_) => 1001,
            AppError::Forbidden(_) | AppError::QuotaExceeded => 1002,
            AppError::NotFound(_) => 1003,
            AppError::RateLimited { .. } => 1005,
            AppError::MissingHeader(_) => 1007,
            AppError::Conflict(_) => 1008,
            AppError::UpstreamUnavailable(_) | AppError::UpstreamTimeout(_) => 5003,
            AppError::Database(_)
            | AppError::Store(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::ServiceUnavailable => 5000,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamUnavailable(_) | AppError::UpstreamTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Store(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::QuotaExceeded => "Quota exceeded. Please upgrade your plan.".to_string(),
            AppError::Database(_) | AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.message();
        let retry_after = match &self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let envelope = ErrorEnvelope {
            code,
            message: message.clone(),
            error: message,
            timestamp: chrono::Utc::now().timestamp_millis(),
            request_id: String::new(),
            path: String::new(),
            method: String::new(),
        };

        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, secs.into());
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            other => AppError::Database(anyhow::anyhow!(other)),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Store(anyhow::anyhow!(err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("invalid token: {err}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}
