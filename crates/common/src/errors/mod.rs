//! Error types for Skillgraph services
//!
//! Provides the workspace error taxonomy with:
//! - Distinct variants for ingestion, graph, oracle and run failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Ingestion errors (2xxx)
    IngestionError,

    // Graph errors (3xxx)
    GraphInconsistency,

    // Resource errors (4xxx)
    NotFound,
    ProfileNotFound,
    JobNotFound,

    // Run control (5xxx)
    Cancelled,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    OracleUnavailable,
    SourceError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::IngestionError => 2001,

            ErrorCode::GraphInconsistency => 3001,

            ErrorCode::NotFound => 4001,
            ErrorCode::ProfileNotFound => 4002,
            ErrorCode::JobNotFound => 4004,

            ErrorCode::Cancelled => 5001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::OracleUnavailable => 8002,
            ErrorCode::SourceError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Ingestion errors (per record, normally skipped and counted)
    #[error("Malformed activity record {record}: {reason}")]
    Ingestion { record: String, reason: String },

    // Graph invariant violations abort the run
    #[error("Graph inconsistency at {identity}: {detail}")]
    GraphInconsistency { identity: String, detail: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Profile not found: {developer}")]
    ProfileNotFound { developer: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    // Cooperative stop of an inference run
    #[error("Inference run cancelled")]
    Cancelled,

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("Scoring oracle unavailable: {message}")]
    OracleUnavailable { message: String },

    #[error("Activity source error: {message}")]
    Source { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a graph invariant violation
    pub fn inconsistency(identity: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::GraphInconsistency {
            identity: identity.into(),
            detail: detail.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Ingestion { .. } => ErrorCode::IngestionError,
            AppError::GraphInconsistency { .. } => ErrorCode::GraphInconsistency,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ProfileNotFound { .. } => ErrorCode::ProfileNotFound,
            AppError::JobNotFound { .. } => ErrorCode::JobNotFound,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::OracleUnavailable { .. } => ErrorCode::OracleUnavailable,
            AppError::Source { .. } => ErrorCode::SourceError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::Ingestion { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::ProfileNotFound { .. }
            | AppError::JobNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Cancelled => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::GraphInconsistency { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Source { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::OracleUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether search may continue with a degraded default after this error
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            AppError::OracleUnavailable { .. } | AppError::Serialization(_)
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::GraphInconsistency { identity, detail } => Some(serde_json::json!({
                "identity": identity,
                "detail": detail,
            })),
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ProfileNotFound {
            developer: "octocat".into(),
        };
        assert_eq!(err.code(), ErrorCode::ProfileNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_graph_inconsistency_is_fatal_server_error() {
        let err = AppError::inconsistency("repo:acme/api", "attributes of kind commit");
        assert_eq!(err.code(), ErrorCode::GraphInconsistency);
        assert!(err.is_server_error());
        assert!(!err.is_degradable());
        assert!(err.to_string().contains("repo:acme/api"));
    }

    #[test]
    fn test_oracle_errors_degrade() {
        assert!(AppError::OracleUnavailable {
            message: "503".into()
        }
        .is_degradable());
        assert!(!AppError::Cancelled.is_degradable());
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid login".into(),
            field: Some("login".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_numeric_codes_are_grouped() {
        assert_eq!(ErrorCode::GraphInconsistency.as_code() / 1000, 3);
        assert_eq!(ErrorCode::OracleUnavailable.as_code() / 1000, 8);
    }
}
