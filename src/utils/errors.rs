//! Error handling for FRSaaS
//!
//! This module defines the main error type used throughout the application
//! and maps every failure onto the response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::response::{ApiResponse, ResponseCode};

/// Main error type for the FRSaaS backend
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operating failed: {0}")]
    OperatingFailed(Value),

    #[error("Illegal parameters: {0}")]
    IllegalParameters(Value),

    #[error("Unauthorized: {0}")]
    Unauthorized(Value),

    #[error("Forbidden: {0}")]
    Forbidden(Value),

    #[error("Not found: {0}")]
    NotFound(Value),

    #[error("Request timeout: {0}")]
    RequestTimeout(Value),

    #[error("Request validation failed: {0:?}")]
    Validation(Vec<String>),
}

/// Result type alias for FRSaaS operations
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn operating_failed(msg: impl Into<String>) -> Self {
        AppError::OperatingFailed(Value::String(msg.into()))
    }

    pub fn illegal_parameters(msg: impl Into<String>) -> Self {
        AppError::IllegalParameters(Value::String(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(Value::String(msg.into()))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(Value::String(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(Value::String(msg.into()))
    }

    pub fn request_timeout(msg: impl Into<String>) -> Self {
        AppError::RequestTimeout(Value::String(msg.into()))
    }

    /// Whether the database refused a duplicate key
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::RequestTimeout(_))
    }

    /// Replace an upstream failure with `fallback`, keeping timeouts as they are
    pub fn unless_timeout(self, fallback: impl FnOnce(Self) -> Self) -> Self {
        if self.is_timeout() {
            self
        } else {
            fallback(self)
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Database(_) => false,
            AppError::Migration(_) => false,
            AppError::Redis(_) => true,
            AppError::Http(_) => true,
            AppError::Serialization(_) => false,
            AppError::Io(_) => true,
            AppError::UrlParse(_) => false,
            AppError::Token(_) => false,
            AppError::Multipart(_) => false,
            AppError::Settings(_) => false,
            AppError::Config(_) => false,
            AppError::PasswordHash(_) => false,
            AppError::Storage(_) => true,
            AppError::OperatingFailed(_) => true,
            AppError::IllegalParameters(_) => false,
            AppError::Unauthorized(_) => false,
            AppError::Forbidden(_) => false,
            AppError::NotFound(_) => false,
            AppError::RequestTimeout(_) => true,
            AppError::Validation(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Database(_) => ErrorSeverity::Critical,
            AppError::Migration(_) => ErrorSeverity::Critical,
            AppError::Settings(_) => ErrorSeverity::Critical,
            AppError::Config(_) => ErrorSeverity::Critical,
            AppError::Unauthorized(_) => ErrorSeverity::Warning,
            AppError::Forbidden(_) => ErrorSeverity::Warning,
            AppError::RequestTimeout(_) => ErrorSeverity::Warning,
            AppError::OperatingFailed(_) => ErrorSeverity::Info,
            AppError::IllegalParameters(_) => ErrorSeverity::Info,
            AppError::NotFound(_) => ErrorSeverity::Info,
            AppError::Validation(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Envelope code reported for this error
    pub fn response_code(&self) -> ResponseCode {
        match self {
            AppError::OperatingFailed(_) => ResponseCode::OperatingFailed,
            AppError::IllegalParameters(_) | AppError::Validation(_) => ResponseCode::IllegalParameters,
            AppError::Unauthorized(_) => ResponseCode::Unauthorized,
            AppError::Forbidden(_) => ResponseCode::Forbidden,
            AppError::NotFound(_) => ResponseCode::NotFound,
            AppError::RequestTimeout(_) => ResponseCode::RequestTimeout,
            _ => ResponseCode::SystemError,
        }
    }

    /// HTTP status carrying the envelope
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OperatingFailed(_)
            | AppError::IllegalParameters(_)
            | AppError::Unauthorized(_)
            | AppError::Forbidden(_)
            | AppError::NotFound(_)
            | AppError::RequestTimeout(_) => StatusCode::OK,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope payload for this error
    pub fn data(&self) -> Value {
        match self {
            AppError::OperatingFailed(data)
            | AppError::IllegalParameters(data)
            | AppError::Unauthorized(data)
            | AppError::Forbidden(data)
            | AppError::NotFound(data)
            | AppError::RequestTimeout(data) => data.clone(),
            AppError::Validation(errors) => Value::from(errors.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.response_code();
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                error!(error = %self, code = %code, severity = %self.severity(), "Request failed");
            }
            ErrorSeverity::Warning => {
                warn!(error = %self, code = %code, "Request rejected");
            }
            ErrorSeverity::Info => {
                info!(error = %self, code = %code, "Request not fulfilled");
            }
        }

        (self.status_code(), ApiResponse::with_code(code, self.data())).into_response()
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_business_errors_use_http_ok() {
        let err = AppError::forbidden("email already registered");
        assert_eq!(err.status_code(), StatusCode::OK);
        assert_eq!(err.response_code(), ResponseCode::Forbidden);
        assert_eq!(err.data(), json!("email already registered"));
    }

    #[test]
    fn test_validation_error_is_unprocessable() {
        let err = AppError::Validation(vec!["body → email: missing field".to_string()]);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.response_code(), ResponseCode::IllegalParameters);
        assert_eq!(err.data(), json!(["body → email: missing field"]));
    }

    #[test]
    fn test_system_errors_map_to_system_error() {
        let err = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_code(), ResponseCode::SystemError);
        assert!(err.data().as_str().unwrap().contains("disk full"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(AppError::Config("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(AppError::unauthorized("x").severity(), ErrorSeverity::Warning);
        assert_eq!(AppError::not_found("x").severity(), ErrorSeverity::Info);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    #[test]
    fn test_upstream_timeout_survives_fallback() {
        let timeout = AppError::request_timeout("request timeout")
            .unless_timeout(|_| AppError::operating_failed("checkout session create failed"));
        assert_eq!(timeout.response_code(), ResponseCode::RequestTimeout);
        assert_eq!(timeout.status_code(), StatusCode::OK);

        let other = AppError::Config("bad gateway".into())
            .unless_timeout(|_| AppError::operating_failed("checkout session create failed"));
        assert_eq!(other.response_code(), ResponseCode::OperatingFailed);
    }

    #[test]
    fn test_structured_payload_is_kept() {
        let err = AppError::OperatingFailed(json!({ "ok": false }));
        assert_eq!(err.data(), json!({ "ok": false }));
    }
}
