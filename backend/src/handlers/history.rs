//! HTTP handlers for the audit trail endpoints

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};

use shared::models::ItemStockHistory;
use shared::types::Pagination;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::{schema, HistoryService};
use crate::AppState;

/// List all history rows, newest first
pub async fn list_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<ItemStockHistory>>> {
    let caps = schema::capabilities(&state.db).await?;
    let service = HistoryService::new(state.db);
    let rows = service.list_all(caps, &pagination).await?;
    Ok(Json(rows))
}

/// Export the full audit trail as CSV
pub async fn export_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let caps = schema::capabilities(&state.db).await?;
    let service = HistoryService::new(state.db);
    let csv = service.export_csv(caps).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"stock-history.csv\""),
    );

    Ok((headers, csv))
}
