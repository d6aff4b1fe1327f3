//! HTTP handlers for item management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use shared::models::Item;
use shared::types::{ItemFilter, Pagination};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::item::{ItemInput, ItemService};
use crate::services::{schema, HistoryService};
use crate::AppState;

/// List active items, optionally filtered by category, status or name
pub async fn list_items(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ItemFilter>,
) -> AppResult<Json<Vec<Item>>> {
    let service = ItemService::new(state.db);
    let items = service.list_items(&filter).await?;
    Ok(Json(items))
}

/// Get one active item
pub async fn get_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<i64>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service.create_item(current_user.0.user_id, input).await?;
    Ok(Json(item))
}

/// Update an item
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<i64>,
    Json(input): Json<ItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service
        .update_item(current_user.0.user_id, item_id, input)
        .await?;
    Ok(Json(item))
}

/// Body for soft-deleting an item
#[derive(Debug, Default, Deserialize)]
pub struct DeleteItemInput {
    pub note: Option<String>,
}

/// Soft-delete an item
pub async fn delete_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<i64>,
    body: Option<Json<DeleteItemInput>>,
) -> AppResult<Json<()>> {
    let note = body.and_then(|Json(input)| input.note);
    let service = ItemService::new(state.db);
    service
        .delete_item(current_user.0.user_id, item_id, note)
        .await?;
    Ok(Json(()))
}

/// History rows for one item
pub async fn get_item_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<shared::models::ItemStockHistory>>> {
    let caps = schema::capabilities(&state.db).await?;
    let service = HistoryService::new(state.db);
    let rows = service.list_for_item(caps, item_id, &pagination).await?;
    Ok(Json(rows))
}

/// Summary of a batch status refresh
#[derive(Debug, Serialize)]
pub struct RefreshSummary {
    pub updated: u64,
}

/// Re-run the status classifier over all active items
pub async fn refresh_statuses(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<RefreshSummary>> {
    let service = ItemService::new(state.db);
    let updated = service.refresh_statuses().await?;
    Ok(Json(RefreshSummary { updated }))
}
