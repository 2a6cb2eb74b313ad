//! HTTP handlers for inter-center transfer endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::ApiResponse;
use uuid::Uuid;

use super::{AppJson, AppPath, AppQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{
    CreateTransferRequest, InterCenterTransfer, ProcessTransferRequest,
    RespondCounterOfferRequest, TransferDirection, TransferExecution,
};
use crate::services::TransferService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTransfersQuery {
    #[serde(default)]
    pub direction: TransferDirection,
}

/// Open a transfer request
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateTransferRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<InterCenterTransfer>>)> {
    let service = TransferService::new(state.db);
    let transfer = service.create(&current_user.0, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Transfer request created", transfer)),
    ))
}

/// List transfers involving the current user's center
pub async fn list_transfers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<ListTransfersQuery>,
) -> AppResult<Json<ApiResponse<Vec<InterCenterTransfer>>>> {
    let service = TransferService::new(state.db);
    let transfers = service.list(&current_user.0, query.direction).await?;
    Ok(Json(ApiResponse::ok("Transfers retrieved", transfers)))
}

/// Get a transfer by ID
pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(transfer_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<InterCenterTransfer>>> {
    let service = TransferService::new(state.db);
    let transfer = service.get(&current_user.0, transfer_id).await?;
    Ok(Json(ApiResponse::ok("Transfer retrieved", transfer)))
}

/// Accept, reject or counter-offer a pending request
pub async fn process_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(transfer_id): AppPath<Uuid>,
    AppJson(input): AppJson<ProcessTransferRequest>,
) -> AppResult<Json<ApiResponse<InterCenterTransfer>>> {
    let service = TransferService::new(state.db);
    let transfer = service.process(&current_user.0, transfer_id, input).await?;
    let message = format!("Transfer {}", transfer.status);
    Ok(Json(ApiResponse::ok(message, transfer)))
}

/// Approve or reject a counter-offer
pub async fn respond_to_counter_offer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(transfer_id): AppPath<Uuid>,
    AppJson(input): AppJson<RespondCounterOfferRequest>,
) -> AppResult<Json<ApiResponse<InterCenterTransfer>>> {
    let service = TransferService::new(state.db);
    let transfer = service.respond(&current_user.0, transfer_id, input).await?;
    let message = format!("Counter offer answered: {}", transfer.status);
    Ok(Json(ApiResponse::ok(message, transfer)))
}

/// Move the agreed stock between the two centers
pub async fn execute_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(transfer_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<TransferExecution>>> {
    let service = TransferService::new(state.db);
    let execution = service.execute(&current_user.0, transfer_id).await?;
    Ok(Json(ApiResponse::ok("Transfer executed", execution)))
}

/// Cancel a transfer request
pub async fn cancel_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(transfer_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<InterCenterTransfer>>> {
    let service = TransferService::new(state.db);
    let transfer = service.cancel(&current_user.0, transfer_id).await?;
    Ok(Json(ApiResponse::ok("Transfer cancelled", transfer)))
}
