//! Error types for the orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

use crate::backend::types::ServiceKind;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Orchestrator is not initialized")]
    NotInitialized,

    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(ServiceKind),

    #[error("Service not configured: {0}")]
    ServiceNotConfigured(ServiceKind),

    #[error("Failed to initialize {kind}: {message}")]
    Initialization { kind: ServiceKind, message: String },

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceNotConfigured(_) => StatusCode::NOT_FOUND,
            AppError::NotInitialized
            | AppError::ShuttingDown
            | AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Processing(_) | AppError::Initialization { .. } => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::NotInitialized => "not_initialized",
            AppError::ShuttingDown => "shutting_down",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::ServiceNotConfigured(_) => "service_not_configured",
            AppError::Initialization { .. } => "initialization_error",
            AppError::Processing(_) => "processing_error",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
