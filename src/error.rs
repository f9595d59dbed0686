//! Error types for rediscope
//!
//! `AppError` covers construction-time and cycle-fatal failures and implements
//! `IntoResponse` for Axum handlers. `ParseError` covers the per-field failures
//! that a scrape cycle logs and skips.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("failed to load TLS config: {0}")]
    TlsConfig(String),

    #[error("Failed to fetch status from {endpoint}: {reason}")]
    StatusFetch { endpoint: String, reason: String },

    #[error("Protocol error from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    #[error("Status snapshot has no uptime_in_seconds field")]
    UptimeMissing,

    #[error("Invalid uptime_in_seconds value '{value}': {reason}")]
    UptimeInvalid { value: String, reason: String },

    #[error("Scrape timed out after {timeout_seconds} seconds")]
    ScrapeTimeout { timeout_seconds: u64 },

    #[error("Metrics export failed: {0}")]
    Export(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error aborts a single scrape cycle rather than startup
    pub fn is_cycle_failure(&self) -> bool {
        matches!(
            self,
            Self::StatusFetch { .. }
                | Self::Protocol { .. }
                | Self::UptimeMissing
                | Self::UptimeInvalid { .. }
                | Self::ScrapeTimeout { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::StatusFetch { .. } | Self::Protocol { .. } => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            Self::ScrapeTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

/// Recoverable failure while parsing a single status field
///
/// A scrape cycle logs these and moves on to the next field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid integer '{value}': {reason}")]
    InvalidInt { value: String, reason: String },

    #[error("invalid float '{value}': {reason}")]
    InvalidFloat { value: String, reason: String },

    #[error("malformed pair '{0}', expected <name>=<value>")]
    MalformedPair(String),

    #[error("keyspace line is missing '{0}'")]
    MissingKeyspaceField(&'static str),

    #[error("percentile label '{0}' does not start with 'p'")]
    InvalidPercentileLabel(String),
}

impl ParseError {
    pub(crate) fn int(value: &str, err: std::num::ParseIntError) -> Self {
        Self::InvalidInt {
            value: value.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn float(value: &str, err: std::num::ParseFloatError) -> Self {
        Self::InvalidFloat {
            value: value.to_string(),
            reason: err.to_string(),
        }
    }
}
