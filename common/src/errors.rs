//! Application error types.
//!
//! Every failure a handler can produce is an [`AppError`]. The error renders
//! itself as an HTTP response carrying `{ "error": ..., "code": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Result alias used across all crates.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Table name is not in the allow-list.
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// Request input failed a presence or shape check.
    #[error("{0}")]
    Validation(String),

    /// Targeted resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Could not obtain a database connection.
    #[error("{0}")]
    DatabaseConnection(String),

    /// Statement execution failed; carries the raw driver message.
    #[error("{0}")]
    DatabaseQuery(String),

    /// Startup configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTable(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_)
            | AppError::DatabaseQuery(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for client handling.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidTable(_) => "INVALID_TABLE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message. Database errors pass the driver text through.
    pub error: String,
    /// Error code (e.g. "INVALID_TABLE", "DATABASE_ERROR").
    pub code: String,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
