//! HTTP handlers for repair checklist endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use shared::ApiResponse;
use uuid::Uuid;

use super::{AppJson, AppPath, OptionalAppJson};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{
    CancelChecklistRequest, Checklist, ChecklistAcceptance, ChecklistCancellation,
    CreateChecklistRequest,
};
use crate::services::ChecklistService;
use crate::AppState;

fn service(state: &AppState) -> ChecklistService {
    ChecklistService::new(
        state.db.clone(),
        state.config.checklist.restore_inventory_on_cancel,
    )
}

/// Create a checklist for an appointment
pub async fn create_checklist(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateChecklistRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Checklist>>)> {
    let checklist = service(&state).create(&current_user.0, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Checklist created", checklist)),
    ))
}

/// Get a checklist by ID
pub async fn get_checklist(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(checklist_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Checklist>>> {
    let checklist = service(&state).get(checklist_id).await?;
    Ok(Json(ApiResponse::ok("Checklist retrieved", checklist)))
}

/// List the checklists of an appointment
pub async fn list_appointment_checklists(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(appointment_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Checklist>>>> {
    let checklists = service(&state).list_for_appointment(appointment_id).await?;
    Ok(Json(ApiResponse::ok("Checklists retrieved", checklists)))
}

/// Accept a checklist, consuming its parts from stock
pub async fn accept_checklist(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(checklist_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ChecklistAcceptance>>> {
    let acceptance = service(&state).accept(&current_user.0, checklist_id).await?;
    Ok(Json(ApiResponse::ok(
        "Checklist accepted and inventory updated",
        acceptance,
    )))
}

/// Complete an accepted checklist
pub async fn complete_checklist(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(checklist_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Checklist>>> {
    let checklist = service(&state).complete(&current_user.0, checklist_id).await?;
    Ok(Json(ApiResponse::ok("Checklist completed", checklist)))
}

/// Cancel a checklist; the body is optional
pub async fn cancel_checklist(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(checklist_id): AppPath<Uuid>,
    OptionalAppJson(input): OptionalAppJson<CancelChecklistRequest>,
) -> AppResult<Json<ApiResponse<ChecklistCancellation>>> {
    let input = input.unwrap_or_default();
    let cancellation = service(&state)
        .cancel(&current_user.0, checklist_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Checklist canceled", cancellation)))
}
