//! HTTP handlers for category endpoints

use axum::{extract::State, Json};

use shared::models::Category;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::CategoryService;
use crate::AppState;

/// List all categories
pub async fn list_categories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let service = CategoryService::new(state.db);
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}
