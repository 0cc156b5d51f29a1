//! Error types for media-dl
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (database, external process supervision)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Failures that happen inside a job's background task are never returned
//! through these types; they end up as a `failed` job record instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue.min_delay")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The submitted URL was rejected before a job was created
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised while locating, spawning or waiting on the external tool.
///
/// A process that starts and exits non-zero is *not* an error here; its exit
/// code is reported in [`ProcessOutput`](crate::orchestrator::ProcessOutput)
/// and left to the classifier.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No executable was found at any candidate location or on PATH
    #[error("{tool} executable not found (searched {searched} locations and PATH)")]
    BinaryNotFound {
        /// Tool name (e.g. "yt-dlp")
        tool: String,
        /// Number of explicit candidate locations probed
        searched: usize,
    },

    /// The executable exists but could not be started
    #[error("failed to start {binary}: {source}")]
    Spawn {
        /// Path of the executable that failed to start
        binary: PathBuf,
        /// Underlying OS error (permission denied, exec format error, ...)
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its wall-clock budget and was killed
    #[error("process killed after exceeding timeout of {}s", .timeout.as_secs())]
    TimedOut {
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// Reading the process output or waiting for exit failed
    #[error("I/O error while supervising process: {0}")]
    Io(#[from] std::io::Error),
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "job 123 not found"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let mut api_error = ApiError::new(error.error_code(), error.to_string());
        api_error.error.details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        api_error
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Returns (Error, expected_status_code, expected_error_code) for every
    /// reachable match arm in ToHttpStatus.
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("queue.min_delay".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::InvalidUrl("ftp://example.com".into()),
                400,
                "invalid_url",
            ),
            (Error::NotFound("job 99".into()), 404, "not_found"),
            (
                Error::Database(DatabaseError::QueryFailed("timeout".into())),
                500,
                "database_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (
                Error::Serialization(serde_json::from_str::<u8>("x").unwrap_err()),
                500,
                "serialization_error",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn api_error_carries_config_key_detail() {
        let api_error: ApiError = Error::Config {
            message: "must be positive".into(),
            key: Some("download.max_concurrent_jobs".into()),
        }
        .into();

        assert_eq!(api_error.error.code, "config_error");
        assert_eq!(
            api_error.error.details,
            Some(serde_json::json!({"key": "download.max_concurrent_jobs"}))
        );
    }

    #[test]
    fn api_error_omits_details_when_absent() {
        let api_error: ApiError = Error::ShuttingDown.into();
        let json = serde_json::to_value(&api_error).unwrap();

        assert_eq!(json["error"]["code"], "shutting_down");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let error = SupervisorError::TimedOut {
            timeout: Duration::from_secs(90),
        };
        assert_eq!(
            error.to_string(),
            "process killed after exceeding timeout of 90s"
        );
    }
}
