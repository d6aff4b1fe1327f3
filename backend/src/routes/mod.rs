//! Route definitions for the Site Stock Management Platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - item management
        .nest("/items", item_routes())
        // Protected routes - categories
        .nest("/categories", category_routes())
        // Protected routes - audit trail
        .nest("/history", history_routes())
}

/// Item management routes (protected)
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/refresh-status", post(handlers::refresh_statuses))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route("/:item_id/history", get(handlers::get_item_history))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Category routes (protected)
fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Audit trail routes (protected)
fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_history))
        .route("/export", get(handlers::export_history))
        .route_layer(middleware::from_fn(auth_middleware))
}
