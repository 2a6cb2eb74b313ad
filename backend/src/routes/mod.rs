//! Route definitions for the EV Service Center Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - repair checklists
        .nest("/checklist", checklist_routes(state.clone()))
        // Protected routes - inter-center transfers
        .nest("/transfer", transfer_routes(state.clone()))
        // Protected routes - inventory ledger
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - catalog lookups
        .nest("/parts", part_routes(state.clone()))
        .nest("/centers", center_routes(state))
}

/// Checklist routes (protected)
fn checklist_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_checklist))
        .route("/:id", get(handlers::get_checklist))
        .route("/:id/accept", put(handlers::accept_checklist))
        .route("/:id/complete", put(handlers::complete_checklist))
        .route("/:id/cancel", put(handlers::cancel_checklist))
        .route(
            "/appointment/:appointment_id",
            get(handlers::list_appointment_checklists),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers))
        .route("/request", post(handlers::create_transfer))
        .route("/:id", get(handlers::get_transfer))
        .route("/:id/process", put(handlers::process_transfer))
        .route("/:id/respond", put(handlers::respond_to_counter_offer))
        .route("/:id/execute", post(handlers::execute_transfer))
        .route("/:id/cancel", put(handlers::cancel_transfer))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/centers/:center_id", get(handlers::list_center_inventory))
        .route("/centers/:center_id/low-stock", get(handlers::list_low_stock))
        .route(
            "/centers/:center_id/parts/:part_id",
            get(handlers::get_inventory_record).put(handlers::upsert_stock),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Part catalog routes (protected)
fn part_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_parts))
        .route("/:id", get(handlers::get_part))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Service center routes (protected)
fn center_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_centers))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
