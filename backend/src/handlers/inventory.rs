//! HTTP handlers for inventory endpoints

use axum::{
    extract::State,
    Json,
};
use shared::ApiResponse;
use uuid::Uuid;

use super::{AppJson, AppPath};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{InventoryRecord, InventoryView, UpsertStockRequest};
use crate::services::InventoryService;
use crate::AppState;

/// List a center's stock
pub async fn list_center_inventory(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(center_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<InventoryView>>>> {
    let service = InventoryService::new(state.db);
    let rows = service.list_for_center(center_id).await?;
    Ok(Json(ApiResponse::ok("Inventory retrieved", rows)))
}

/// List a center's rows at or below minimum stock
pub async fn list_low_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(center_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<InventoryView>>>> {
    let service = InventoryService::new(state.db);
    let rows = service.list_low_stock(center_id).await?;
    Ok(Json(ApiResponse::ok("Low stock items retrieved", rows)))
}

/// Get a single stock row
pub async fn get_inventory_record(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath((center_id, part_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<InventoryRecord>>> {
    let service = InventoryService::new(state.db);
    let record = service.get_record(center_id, part_id).await?;
    Ok(Json(ApiResponse::ok("Inventory record retrieved", record)))
}

/// Restock or adjust a stock row
pub async fn upsert_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath((center_id, part_id)): AppPath<(Uuid, Uuid)>,
    AppJson(input): AppJson<UpsertStockRequest>,
) -> AppResult<Json<ApiResponse<InventoryRecord>>> {
    let service = InventoryService::new(state.db);
    let record = service
        .upsert_stock(&current_user.0, center_id, part_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Inventory updated", record)))
}
