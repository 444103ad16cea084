//! Unified error types for the scitrend backend
//!
//! This module defines error types for each layer:
//! - `ConfigError`: environment configuration errors
//! - `DomainError`: schema store (database) errors
//! - `MigrationError`: migration planning and application errors
//! - `StartupError`: failures of the startup sequence (ready, migrate, serve)
//! - `AppError`: HTTP layer errors

use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Configuration errors raised while reading the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Schema store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Migration errors
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid migration set: {0}")]
    Invalid(String),

    #[error("Migration {version} ({name}) was modified after it was applied")]
    ChecksumMismatch { version: i64, name: String },

    #[error("Database has migration {version} ({name}) which this build does not know about")]
    UnknownAppliedVersion { version: i64, name: String },

    #[error("Migration {version} ({name}) failed: {reason}")]
    Failed {
        version: i64,
        name: String,
        reason: String,
    },

    #[error("Schema store error: {0}")]
    Store(#[from] DomainError),
}

/// Startup sequence errors. Any of these ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database not ready after {attempts} attempts: {last_error}")]
    DatabaseUnavailable {
        attempts: u32,
        last_error: DomainError,
    },

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Application layer errors - used by HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Domain(#[from] DomainError),
}

/// Error response body for JSON responses
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Domain(DomainError::Connection(msg)) => {
                tracing::error!("Database connection error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database unavailable",
                    None,
                )
            }
            AppError::Domain(DomainError::Database(msg)) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_maps_to_503() {
        let response = AppError::Domain(DomainError::Connection("refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn database_error_maps_to_500() {
        let response = AppError::Domain(DomainError::Database("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn startup_error_messages_name_the_failing_migration() {
        let err = StartupError::from(MigrationError::Failed {
            version: 2,
            name: "add_venue".into(),
            reason: "syntax error".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("Migration 2 (add_venue) failed"));
        assert!(msg.contains("syntax error"));
    }
}
