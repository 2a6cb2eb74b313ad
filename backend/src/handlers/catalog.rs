//! HTTP handlers for part and service center lookups

use axum::{
    extract::State,
    Json,
};
use shared::ApiResponse;
use uuid::Uuid;

use super::AppPath;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Part, ServiceCenter};
use crate::services::CatalogService;
use crate::AppState;

/// List all parts
pub async fn list_parts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Part>>>> {
    let service = CatalogService::new(state.db);
    let parts = service.list_parts().await?;
    Ok(Json(ApiResponse::ok("Parts retrieved", parts)))
}

/// Get a part by ID
pub async fn get_part(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(part_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Part>>> {
    let service = CatalogService::new(state.db);
    let part = service.get_part(part_id).await?;
    Ok(Json(ApiResponse::ok("Part retrieved", part)))
}

/// List all service centers
pub async fn list_centers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<ServiceCenter>>>> {
    let service = CatalogService::new(state.db);
    let centers = service.list_centers().await?;
    Ok(Json(ApiResponse::ok("Service centers retrieved", centers)))
}
