//! Error handling for the EV Service Center Platform
//!
//! Every failure leaves the server as the uniform `{ message, success, data }`
//! envelope with `success = false` and a machine-readable `data.code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use shared::{ApiResponse, FieldError, ParseStatusError, Shortfall, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient inventory: {message}")]
    InsufficientInventory {
        message: String,
        items: Vec<Shortfall>,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(errors: Vec<FieldError>) -> Self {
        AppError::Validation(errors)
    }
}

impl From<ParseStatusError> for AppError {
    fn from(err: ParseStatusError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::InsufficientInventory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message; server-side details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::Unauthenticated(msg) | AppError::Forbidden(msg) => msg.clone(),
            AppError::Validation(errors) => match errors.as_slice() {
                [single] => format!("{}: {}", single.field, single.message),
                _ => format!("Validation failed for {} field(s)", errors.len()),
            },
            AppError::ValidationError(msg) => msg.clone(),
            AppError::DuplicateEntry(what) => format!("{} already exists", what),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::InvalidState(msg) => msg.clone(),
            AppError::InsufficientInventory { message, .. } => message.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
        }
    }

    fn detail(&self) -> Value {
        match self {
            AppError::Validation(errors) => json!({ "code": self.code(), "errors": errors }),
            AppError::InsufficientInventory { items, .. } => {
                json!({ "code": self.code(), "insufficient_items": items })
            }
            _ => json!({ "code": self.code() }),
        }
    }
}

/// Error response body
pub type ErrorResponse = ApiResponse<Value>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }

        let body = ErrorResponse::failure(self.public_message(), Some(self.detail()));
        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
