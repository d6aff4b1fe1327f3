//! Schema capability detection
//!
//! The item and history tables may or may not carry certain optional
//! attributes (level gauge columns, calculation mode, soft-delete timestamp,
//! a legacy warehouse-stock column). Which ones exist is detected once per
//! process and cached; capability state only ever changes the persistence
//! column lists, never a computed value.

use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::error::AppResult;

/// Optional attributes present on the item/history tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaCapabilities {
    /// items.level + items.level_conversion, history level_old/level_new
    pub level_gauge: bool,
    /// items.calculation_mode + items.custom_conversion_factor
    pub calculation_mode: bool,
    /// items.deleted_at + items.deleted_by
    pub soft_delete: bool,
    /// legacy items.warehouse_stock column; never read or written, but its
    /// presence must not break inserts that enumerate columns
    pub warehouse_stock: bool,
}

impl SchemaCapabilities {
    /// Derive capabilities from the column names of the items and
    /// item_stock_history tables
    pub fn from_columns(item_columns: &[String], history_columns: &[String]) -> Self {
        let item_has = |name: &str| item_columns.iter().any(|c| c == name);
        let history_has = |name: &str| history_columns.iter().any(|c| c == name);

        Self {
            level_gauge: item_has("level")
                && item_has("level_conversion")
                && item_has("has_level")
                && history_has("level_old")
                && history_has("level_new"),
            calculation_mode: item_has("calculation_mode")
                && item_has("custom_conversion_factor"),
            soft_delete: item_has("deleted_at") && item_has("deleted_by"),
            warehouse_stock: item_has("warehouse_stock"),
        }
    }
}

static CAPABILITIES: OnceCell<SchemaCapabilities> = OnceCell::const_new();

/// Resolve schema capabilities, querying the database on first use only
pub async fn capabilities(db: &PgPool) -> AppResult<SchemaCapabilities> {
    let caps = CAPABILITIES
        .get_or_try_init(|| async { detect(db).await })
        .await?;
    Ok(*caps)
}

async fn detect(db: &PgPool) -> AppResult<SchemaCapabilities> {
    let item_columns = table_columns(db, "items").await?;
    let history_columns = table_columns(db, "item_stock_history").await?;
    Ok(SchemaCapabilities::from_columns(
        &item_columns,
        &history_columns,
    ))
}

async fn table_columns(db: &PgPool, table: &str) -> AppResult<Vec<String>> {
    let columns = sqlx::query_scalar::<_, String>(
        r#"
        SELECT column_name FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        "#,
    )
    .bind(table)
    .fetch_all(db)
    .await?;

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_schema() {
        let caps = SchemaCapabilities::from_columns(
            &cols(&[
                "id",
                "name",
                "level",
                "level_conversion",
                "has_level",
                "calculation_mode",
                "custom_conversion_factor",
                "deleted_at",
                "deleted_by",
            ]),
            &cols(&["id", "level_old", "level_new"]),
        );
        assert!(caps.level_gauge);
        assert!(caps.calculation_mode);
        assert!(caps.soft_delete);
        assert!(!caps.warehouse_stock);
    }

    #[test]
    fn test_baseline_schema_has_no_optional_attributes() {
        let caps = SchemaCapabilities::from_columns(
            &cols(&["id", "name", "field_stock", "unit_conversion"]),
            &cols(&["id", "item_id"]),
        );
        assert!(!caps.level_gauge);
        assert!(!caps.calculation_mode);
        assert!(!caps.soft_delete);
    }

    #[test]
    fn test_level_gauge_requires_history_columns_too() {
        // Item columns alone are not enough; history snapshots must be
        // persistable as well.
        let caps = SchemaCapabilities::from_columns(
            &cols(&["level", "level_conversion", "has_level"]),
            &cols(&["id"]),
        );
        assert!(!caps.level_gauge);
    }

    #[test]
    fn test_legacy_warehouse_stock_detected() {
        let caps =
            SchemaCapabilities::from_columns(&cols(&["id", "warehouse_stock"]), &cols(&["id"]));
        assert!(caps.warehouse_stock);
    }
}
