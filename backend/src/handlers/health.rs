//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use shared::ApiResponse;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            "disconnected"
        }
    };

    Json(ApiResponse::ok(
        "Service is running",
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: db_status.to_string(),
        },
    ))
}
