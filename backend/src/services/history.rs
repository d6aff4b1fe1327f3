//! Stock history: append-only audit records
//!
//! History rows are only ever inserted, inside the same transaction as the
//! item mutation that produced them. The read side serves the API and the
//! item-history estimator; there is no update or delete path.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use shared::models::{
    HistoryAction, ItemStockHistory, ResolvedConsumption, StockStatus,
};
use shared::types::Pagination;

use crate::error::{AppError, AppResult};
use crate::services::schema::SchemaCapabilities;

/// One side (old or new) of a history snapshot pair
#[derive(Debug, Clone)]
pub struct HistorySide {
    pub field_stock: i32,
    pub level: Option<i32>,
    pub status: StockStatus,
    pub total_stock: Decimal,
    pub days_coverage: i64,
}

/// A history row ready to be appended within a mutation's transaction
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub item_id: i64,
    pub item_name: String,
    pub category: String,
    pub action: HistoryAction,
    pub old: Option<HistorySide>,
    pub new: Option<HistorySide>,
    pub unit: String,
    pub conversion_factor: Decimal,
    pub resolved: ResolvedConsumption,
    pub changed_by: Uuid,
    pub note: Option<String>,
}

/// Append one history row. Must be called with the transaction of the item
/// mutation it records; never commits or rolls back itself.
pub async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    caps: SchemaCapabilities,
    record: &NewHistoryRecord,
) -> AppResult<()> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO item_stock_history (item_id, item_name, category, action, \
         field_stock_old, field_stock_new, status_old, status_new, \
         total_stock_old, total_stock_new, days_coverage_old, days_coverage_new, \
         unit, conversion_factor, daily_consumption, consumption_source, \
         changed_by, note",
    );
    if caps.level_gauge {
        qb.push(", level_old, level_new");
    }
    qb.push(") VALUES (");

    let mut values = qb.separated(", ");
    values.push_bind(record.item_id);
    values.push_bind(&record.item_name);
    values.push_bind(&record.category);
    values.push_bind(record.action.as_str());
    values.push_bind(record.old.as_ref().map(|s| s.field_stock));
    values.push_bind(record.new.as_ref().map(|s| s.field_stock));
    values.push_bind(record.old.as_ref().map(|s| s.status.as_str()));
    values.push_bind(record.new.as_ref().map(|s| s.status.as_str()));
    values.push_bind(record.old.as_ref().map(|s| s.total_stock));
    values.push_bind(record.new.as_ref().map(|s| s.total_stock));
    values.push_bind(record.old.as_ref().map(|s| s.days_coverage));
    values.push_bind(record.new.as_ref().map(|s| s.days_coverage));
    values.push_bind(&record.unit);
    values.push_bind(record.conversion_factor);
    values.push_bind(record.resolved.value);
    values.push_bind(record.resolved.provenance_note());
    values.push_bind(record.changed_by);
    values.push_bind(&record.note);
    if caps.level_gauge {
        values.push_bind(record.old.as_ref().and_then(|s| s.level));
        values.push_bind(record.new.as_ref().and_then(|s| s.level));
    }
    qb.push(")");

    qb.build().execute(&mut **tx).await?;
    Ok(())
}

/// Read side of the audit trail
#[derive(Clone)]
pub struct HistoryService {
    db: PgPool,
}

impl HistoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// History rows for one item, newest first. Works for archived items
    /// too: history remains queryable after a soft-delete.
    pub async fn list_for_item(
        &self,
        caps: SchemaCapabilities,
        item_id: i64,
        pagination: &Pagination,
    ) -> AppResult<Vec<ItemStockHistory>> {
        let mut qb = select_history(caps);
        qb.push(" WHERE item_id = ");
        qb.push_bind(item_id);
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(pagination.limit());
        qb.push(" OFFSET ");
        qb.push_bind(pagination.offset());

        let rows = qb.build().fetch_all(&self.db).await?;
        rows.iter().map(|r| history_from_row(r, caps)).collect()
    }

    /// All history rows, newest first
    pub async fn list_all(
        &self,
        caps: SchemaCapabilities,
        pagination: &Pagination,
    ) -> AppResult<Vec<ItemStockHistory>> {
        let mut qb = select_history(caps);
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(pagination.limit());
        qb.push(" OFFSET ");
        qb.push_bind(pagination.offset());

        let rows = qb.build().fetch_all(&self.db).await?;
        rows.iter().map(|r| history_from_row(r, caps)).collect()
    }

    /// Full audit trail as CSV for office reporting
    pub async fn export_csv(&self, caps: SchemaCapabilities) -> AppResult<Vec<u8>> {
        let mut qb = select_history(caps);
        qb.push(" ORDER BY created_at DESC");
        let rows = qb.build().fetch_all(&self.db).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "id",
                "item_id",
                "item_name",
                "category",
                "action",
                "field_stock_old",
                "field_stock_new",
                "level_old",
                "level_new",
                "status_old",
                "status_new",
                "total_stock_old",
                "total_stock_new",
                "days_coverage_old",
                "days_coverage_new",
                "unit",
                "conversion_factor",
                "daily_consumption",
                "consumption_source",
                "changed_by",
                "note",
                "created_at",
            ])
            .map_err(|e| AppError::Internal(e.to_string()))?;

        for row in &rows {
            let entry = history_from_row(row, caps)?;
            writer
                .write_record([
                    entry.id.to_string(),
                    entry.item_id.to_string(),
                    entry.item_name.clone(),
                    entry.category.clone(),
                    entry.action.as_str().to_string(),
                    opt_string(entry.field_stock_old),
                    opt_string(entry.field_stock_new),
                    opt_string(entry.level_old),
                    opt_string(entry.level_new),
                    entry.status_old.map(|s| s.as_str().to_string()).unwrap_or_default(),
                    entry.status_new.map(|s| s.as_str().to_string()).unwrap_or_default(),
                    opt_string(entry.total_stock_old),
                    opt_string(entry.total_stock_new),
                    opt_string(entry.days_coverage_old),
                    opt_string(entry.days_coverage_new),
                    entry.unit.clone(),
                    entry.conversion_factor.to_string(),
                    entry.daily_consumption.to_string(),
                    entry.consumption_source.clone(),
                    entry.changed_by.to_string(),
                    entry.note.clone().unwrap_or_default(),
                    entry.created_at.to_rfc3339(),
                ])
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }

        writer
            .into_inner()
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn select_history(caps: SchemaCapabilities) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT id, item_id, item_name, category, action, \
         field_stock_old, field_stock_new, status_old, status_new, \
         total_stock_old, total_stock_new, days_coverage_old, days_coverage_new, \
         unit, conversion_factor, daily_consumption, consumption_source, \
         changed_by, note, created_at",
    );
    if caps.level_gauge {
        qb.push(", level_old, level_new");
    }
    qb.push(" FROM item_stock_history");
    qb
}

fn history_from_row(
    row: &sqlx::postgres::PgRow,
    caps: SchemaCapabilities,
) -> AppResult<ItemStockHistory> {
    let action: String = row.try_get("action")?;
    let action = HistoryAction::from_str(&action)
        .ok_or_else(|| AppError::Internal(format!("Unknown history action: {}", action)))?;

    let status_old: Option<String> = row.try_get("status_old")?;
    let status_new: Option<String> = row.try_get("status_new")?;

    let (level_old, level_new) = if caps.level_gauge {
        (row.try_get("level_old")?, row.try_get("level_new")?)
    } else {
        (None, None)
    };

    Ok(ItemStockHistory {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        item_name: row.try_get("item_name")?,
        category: row.try_get("category")?,
        action,
        field_stock_old: row.try_get("field_stock_old")?,
        field_stock_new: row.try_get("field_stock_new")?,
        level_old,
        level_new,
        status_old: status_old.as_deref().and_then(StockStatus::from_str),
        status_new: status_new.as_deref().and_then(StockStatus::from_str),
        total_stock_old: row.try_get("total_stock_old")?,
        total_stock_new: row.try_get("total_stock_new")?,
        days_coverage_old: row.try_get("days_coverage_old")?,
        days_coverage_new: row.try_get("days_coverage_new")?,
        unit: row.try_get("unit")?,
        conversion_factor: row.try_get("conversion_factor")?,
        daily_consumption: row.try_get("daily_consumption")?,
        consumption_source: row.try_get("consumption_source")?,
        changed_by: row.try_get("changed_by")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_record_sides_for_insert() {
        let record = NewHistoryRecord {
            item_id: 1,
            item_name: "Diesel".into(),
            category: "Fuel".into(),
            action: HistoryAction::Insert,
            old: None,
            new: Some(HistorySide {
                field_stock: 50,
                level: None,
                status: StockStatus::LowStock,
                total_stock: dec("100"),
                days_coverage: 6,
            }),
            unit: "drum".into(),
            conversion_factor: dec("2"),
            resolved: ResolvedConsumption::rule_based(dec("14.29")),
            changed_by: Uuid::nil(),
            note: None,
        };
        assert!(record.old.is_none());
        assert_eq!(record.new.as_ref().unwrap().days_coverage, 6);
        assert!(record.resolved.provenance_note().contains("rule-based"));
    }
}
