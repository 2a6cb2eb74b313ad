//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Uniform response body: `{ message, success, data? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            success: true,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            message: message.into(),
            success: false,
            data,
        }
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
