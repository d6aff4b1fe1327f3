//! Category collaborator
//!
//! Categories are managed elsewhere; the stock engine consumes the active
//! check during validation and exposes the list for filtering UIs.

use sqlx::PgPool;

use shared::models::Category;

use crate::error::AppResult;

#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all categories, active first
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, (i64, String, bool, chrono::DateTime<chrono::Utc>)>(
            "SELECT id, name, is_active, created_at FROM categories ORDER BY is_active DESC, name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, is_active, created_at)| Category {
                id,
                name,
                is_active,
                created_at,
            })
            .collect())
    }

    /// Is the named category currently active
    pub async fn is_active(&self, name: &str) -> AppResult<bool> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1 AND is_active = TRUE)",
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        Ok(active)
    }
}
