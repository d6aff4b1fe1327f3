//! Item mutation service
//!
//! Create, update and soft-delete of items. Every mutation validates first,
//! derives before/after metrics through the consumption resolver, then writes
//! the item row and exactly one history row inside a single transaction.
//! A failure at any step rolls back the whole mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use shared::models::{CalculationMode, HistoryAction, Item, StockStatus};
use shared::types::ItemFilter;
use shared::validation;

use crate::error::{AppError, AppResult};
use crate::services::category::CategoryService;
use crate::services::consumption::{ConsumptionContext, ConsumptionService};
use crate::services::history::{insert_history, HistorySide, NewHistoryRecord};
use crate::services::schema::{self, SchemaCapabilities};
use crate::services::stock_calc::{metrics_from, ItemMetrics, StockSnapshot};

/// Input for creating or updating an item
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
    pub field_stock: i32,
    pub unit_conversion: Decimal,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub has_level: bool,
    #[serde(default)]
    pub calculation_mode: CalculationMode,
    #[serde(default)]
    pub level_conversion: Option<Decimal>,
    #[serde(default)]
    pub custom_conversion_factor: Option<Decimal>,
    pub daily_consumption: Decimal,
    pub min_days_coverage: i32,
    /// Free-text note carried onto the history row
    #[serde(default)]
    pub note: Option<String>,
}

/// Field-level validation, collected as a list. Category activity is checked
/// separately against the category collaborator.
pub fn validate_fields(input: &ItemInput, caps: SchemaCapabilities) -> Vec<String> {
    let mut errors = Vec::new();
    let mut check = |result: Result<(), &'static str>| {
        if let Err(msg) = result {
            errors.push(msg.to_string());
        }
    };

    check(validation::validate_item_name(&input.name));
    check(validation::validate_category_name(&input.category));
    check(validation::validate_unit_label(&input.unit));
    check(validation::validate_field_stock(input.field_stock));
    check(validation::validate_unit_conversion(input.unit_conversion));
    check(validation::validate_level(input.level, input.has_level));
    check(validation::validate_level_conversion(input.level_conversion));
    check(validation::validate_custom_factor(
        input.calculation_mode,
        input.custom_conversion_factor,
    ));
    check(validation::validate_daily_consumption(input.daily_consumption));
    check(validation::validate_min_days_coverage(input.min_days_coverage));

    if input.has_level && !caps.level_gauge {
        errors.push("Level gauge is not available on this installation".to_string());
    }
    if input.calculation_mode == CalculationMode::Multiplied && !caps.calculation_mode {
        errors.push("Calculation modes are not available on this installation".to_string());
    }

    errors
}

fn snapshot_from_input(input: &ItemInput) -> StockSnapshot {
    StockSnapshot {
        field_stock: input.field_stock,
        unit_conversion: input.unit_conversion,
        level: input.level,
        has_level: input.has_level,
        calculation_mode: input.calculation_mode,
        level_conversion: input.level_conversion,
        custom_conversion_factor: input.custom_conversion_factor,
        min_days_coverage: input.min_days_coverage,
    }
}

fn snapshot_from_item(item: &Item) -> StockSnapshot {
    StockSnapshot {
        field_stock: item.field_stock,
        unit_conversion: item.unit_conversion,
        level: item.level,
        has_level: item.has_level,
        calculation_mode: item.calculation_mode,
        level_conversion: item.level_conversion,
        custom_conversion_factor: item.custom_conversion_factor,
        min_days_coverage: item.min_days_coverage,
    }
}

fn side_from_metrics(snapshot: &StockSnapshot, metrics: &ItemMetrics) -> HistorySide {
    HistorySide {
        field_stock: snapshot.field_stock,
        level: if snapshot.has_level { snapshot.level } else { None },
        status: metrics.status,
        total_stock: metrics.effective_stock,
        days_coverage: metrics.days_coverage,
    }
}

/// Item mutation and query service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

impl ItemService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List active items, optionally filtered
    pub async fn list_items(&self, filter: &ItemFilter) -> AppResult<Vec<Item>> {
        let caps = schema::capabilities(&self.db).await?;

        let mut qb = select_items(caps);
        qb.push(" WHERE 1 = 1");
        if caps.soft_delete {
            qb.push(" AND deleted_at IS NULL");
        }
        if let Some(category) = &filter.category {
            qb.push(" AND category = ");
            qb.push_bind(category.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(search) = &filter.search {
            qb.push(" AND name ILIKE ");
            qb.push_bind(format!("%{}%", search));
        }
        qb.push(" ORDER BY name");

        let rows = qb.build().fetch_all(&self.db).await?;
        rows.iter().map(|r| item_from_row(r, caps)).collect()
    }

    /// Fetch one active item
    pub async fn get_item(&self, item_id: i64) -> AppResult<Item> {
        let caps = schema::capabilities(&self.db).await?;

        let mut qb = select_items(caps);
        qb.push(" WHERE id = ");
        qb.push_bind(item_id);
        if caps.soft_delete {
            qb.push(" AND deleted_at IS NULL");
        }

        let row = qb
            .build()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        item_from_row(&row, caps)
    }

    /// Create an item and its insert history row atomically
    pub async fn create_item(&self, actor: Uuid, input: ItemInput) -> AppResult<Item> {
        let caps = schema::capabilities(&self.db).await?;
        self.validate(&input, caps).await?;

        let consumption = ConsumptionService::new(self.db.clone(), caps);
        let mut ctx = ConsumptionContext::new();

        let snapshot = snapshot_from_input(&input);
        let metrics = self
            .metrics(&consumption, &mut ctx, None, &input.category, input.daily_consumption, &snapshot)
            .await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let item_id = insert_item_row(&mut tx, caps, &input, &metrics, now).await?;

        insert_history(
            &mut tx,
            caps,
            &NewHistoryRecord {
                item_id,
                item_name: input.name.clone(),
                category: input.category.clone(),
                action: HistoryAction::Insert,
                old: None,
                new: Some(side_from_metrics(&snapshot, &metrics)),
                unit: input.unit.clone(),
                conversion_factor: snapshot.conversion_factor_used(),
                resolved: metrics.resolved.clone(),
                changed_by: actor,
                note: input.note.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id, actor = %actor, "Item created");
        self.get_item(item_id).await
    }

    /// Update an item, snapshotting old and new metrics in one history row
    pub async fn update_item(&self, actor: Uuid, item_id: i64, input: ItemInput) -> AppResult<Item> {
        let caps = schema::capabilities(&self.db).await?;
        let current = self.get_item(item_id).await?;
        self.validate(&input, caps).await?;

        let consumption = ConsumptionService::new(self.db.clone(), caps);
        let mut ctx = ConsumptionContext::new();

        let old_snapshot = snapshot_from_item(&current);
        let old_metrics = self
            .metrics(
                &consumption,
                &mut ctx,
                Some(item_id),
                &current.category,
                current.daily_consumption,
                &old_snapshot,
            )
            .await?;

        let new_snapshot = snapshot_from_input(&input);
        let new_metrics = self
            .metrics(
                &consumption,
                &mut ctx,
                Some(item_id),
                &input.category,
                input.daily_consumption,
                &new_snapshot,
            )
            .await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        update_item_row(&mut tx, caps, item_id, &input, &new_metrics, now).await?;

        insert_history(
            &mut tx,
            caps,
            &NewHistoryRecord {
                item_id,
                item_name: input.name.clone(),
                category: input.category.clone(),
                action: HistoryAction::Update,
                old: Some(side_from_metrics(&old_snapshot, &old_metrics)),
                new: Some(side_from_metrics(&new_snapshot, &new_metrics)),
                unit: input.unit.clone(),
                conversion_factor: new_snapshot.conversion_factor_used(),
                resolved: new_metrics.resolved.clone(),
                changed_by: actor,
                note: input.note.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id, actor = %actor, "Item updated");
        self.get_item(item_id).await
    }

    /// Soft-delete an item: set the deletion timestamp and append the final
    /// history row. The row itself is never removed, so history stays
    /// attributable.
    pub async fn delete_item(&self, actor: Uuid, item_id: i64, note: Option<String>) -> AppResult<()> {
        let caps = schema::capabilities(&self.db).await?;
        if !caps.soft_delete {
            return Err(AppError::Configuration(
                "Item deletion requires the deleted_at/deleted_by attributes".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        // Row lock held for the duration of this transaction
        let mut qb = select_items(caps);
        qb.push(" WHERE id = ");
        qb.push_bind(item_id);
        qb.push(" AND deleted_at IS NULL FOR UPDATE");
        let row = qb
            .build()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
        let current = item_from_row(&row, caps)?;

        let consumption = ConsumptionService::new(self.db.clone(), caps);
        let mut ctx = ConsumptionContext::new();
        let snapshot = snapshot_from_item(&current);
        let metrics = self
            .metrics(
                &consumption,
                &mut ctx,
                Some(item_id),
                &current.category,
                current.daily_consumption,
                &snapshot,
            )
            .await?;
        let now = Utc::now();

        sqlx::query("UPDATE items SET deleted_at = $1, deleted_by = $2, last_updated = $1 WHERE id = $3")
            .bind(now)
            .bind(actor)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        insert_history(
            &mut tx,
            caps,
            &NewHistoryRecord {
                item_id,
                item_name: current.name.clone(),
                category: current.category.clone(),
                action: HistoryAction::Delete,
                old: Some(side_from_metrics(&snapshot, &metrics)),
                new: None,
                unit: current.unit.clone(),
                conversion_factor: snapshot.conversion_factor_used(),
                resolved: metrics.resolved.clone(),
                changed_by: actor,
                note,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id, actor = %actor, "Item archived");
        Ok(())
    }

    /// Re-run the classifier over all active items and rewrite the cached
    /// status where it drifted. Changes no raw quantities, so no history rows
    /// are produced. Returns the number of items whose status changed.
    pub async fn refresh_statuses(&self) -> AppResult<u64> {
        let caps = schema::capabilities(&self.db).await?;
        let items = self.list_items(&ItemFilter::default()).await?;

        let consumption = ConsumptionService::new(self.db.clone(), caps);
        let mut ctx = ConsumptionContext::new();
        let mut updated = 0u64;

        for item in &items {
            let snapshot = snapshot_from_item(item);
            let metrics = self
                .metrics(
                    &consumption,
                    &mut ctx,
                    Some(item.id),
                    &item.category,
                    item.daily_consumption,
                    &snapshot,
                )
                .await?;

            if metrics.status != item.status {
                sqlx::query("UPDATE items SET status = $1, last_updated = $2 WHERE id = $3")
                    .bind(metrics.status.as_str())
                    .bind(Utc::now())
                    .bind(item.id)
                    .execute(&self.db)
                    .await?;
                updated += 1;
            }
        }

        tracing::info!(total = items.len(), updated, "Status refresh completed");
        Ok(updated)
    }

    /// Validate input and the category collaborator, reporting all failures
    /// at once
    async fn validate(&self, input: &ItemInput, caps: SchemaCapabilities) -> AppResult<()> {
        let mut errors = validate_fields(input, caps);

        if !input.category.trim().is_empty() {
            let categories = CategoryService::new(self.db.clone());
            if !categories.is_active(&input.category).await? {
                errors.push(format!("Category '{}' is not an active category", input.category));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(errors))
        }
    }

    async fn metrics(
        &self,
        consumption: &ConsumptionService,
        ctx: &mut ConsumptionContext,
        item_id: Option<i64>,
        category: &str,
        manual: Decimal,
        snapshot: &StockSnapshot,
    ) -> AppResult<ItemMetrics> {
        let effective = snapshot.effective_stock();
        let resolved = consumption
            .resolve(
                ctx,
                manual,
                item_id,
                category,
                effective,
                snapshot.min_days_coverage,
            )
            .await?;
        Ok(metrics_from(snapshot, resolved))
    }
}

fn select_items(caps: SchemaCapabilities) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT id, name, category, unit, description, field_stock, unit_conversion, \
         daily_consumption, min_days_coverage, status, last_updated",
    );
    if caps.level_gauge {
        qb.push(", level, level_conversion, has_level");
    }
    if caps.calculation_mode {
        qb.push(", calculation_mode, custom_conversion_factor");
    }
    if caps.soft_delete {
        qb.push(", deleted_at, deleted_by");
    }
    qb.push(" FROM items");
    qb
}

fn item_from_row(row: &PgRow, caps: SchemaCapabilities) -> AppResult<Item> {
    let status: String = row.try_get("status")?;
    let status = StockStatus::from_str(&status)
        .ok_or_else(|| AppError::Internal(format!("Unknown stock status: {}", status)))?;

    let (level, level_conversion, has_level) = if caps.level_gauge {
        (
            row.try_get("level")?,
            row.try_get("level_conversion")?,
            row.try_get("has_level")?,
        )
    } else {
        (None, None, false)
    };

    let (calculation_mode, custom_conversion_factor) = if caps.calculation_mode {
        let mode: String = row.try_get("calculation_mode")?;
        let mode = CalculationMode::from_str(&mode)
            .ok_or_else(|| AppError::Internal(format!("Unknown calculation mode: {}", mode)))?;
        (mode, row.try_get("custom_conversion_factor")?)
    } else {
        (CalculationMode::Combined, None)
    };

    let (deleted_at, deleted_by): (Option<DateTime<Utc>>, Option<Uuid>) = if caps.soft_delete {
        (row.try_get("deleted_at")?, row.try_get("deleted_by")?)
    } else {
        (None, None)
    };

    Ok(Item {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        unit: row.try_get("unit")?,
        description: row.try_get("description")?,
        field_stock: row.try_get("field_stock")?,
        unit_conversion: row.try_get("unit_conversion")?,
        level,
        level_conversion,
        has_level,
        calculation_mode,
        custom_conversion_factor,
        daily_consumption: row.try_get("daily_consumption")?,
        min_days_coverage: row.try_get("min_days_coverage")?,
        status,
        last_updated: row.try_get("last_updated")?,
        deleted_at,
        deleted_by,
    })
}

async fn insert_item_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    caps: SchemaCapabilities,
    input: &ItemInput,
    metrics: &ItemMetrics,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO items (name, category, unit, description, field_stock, unit_conversion, \
         daily_consumption, min_days_coverage, status, last_updated",
    );
    if caps.level_gauge {
        qb.push(", level, level_conversion, has_level");
    }
    if caps.calculation_mode {
        qb.push(", calculation_mode, custom_conversion_factor");
    }
    qb.push(") VALUES (");

    let mut values = qb.separated(", ");
    values.push_bind(input.name.clone());
    values.push_bind(input.category.clone());
    values.push_bind(input.unit.clone());
    values.push_bind(input.description.clone());
    values.push_bind(input.field_stock);
    values.push_bind(input.unit_conversion);
    values.push_bind(input.daily_consumption);
    values.push_bind(input.min_days_coverage);
    values.push_bind(metrics.status.as_str());
    values.push_bind(now);
    if caps.level_gauge {
        values.push_bind(input.level);
        values.push_bind(input.level_conversion);
        values.push_bind(input.has_level);
    }
    if caps.calculation_mode {
        values.push_bind(input.calculation_mode.as_str());
        values.push_bind(input.custom_conversion_factor);
    }
    qb.push(") RETURNING id");

    let item_id: i64 = qb.build_query_scalar().fetch_one(&mut **tx).await?;
    Ok(item_id)
}

async fn update_item_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    caps: SchemaCapabilities,
    item_id: i64,
    input: &ItemInput,
    metrics: &ItemMetrics,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE items SET ");

    let mut assignments = qb.separated(", ");
    assignments.push("name = ").push_bind_unseparated(input.name.clone());
    assignments.push("category = ").push_bind_unseparated(input.category.clone());
    assignments.push("unit = ").push_bind_unseparated(input.unit.clone());
    assignments.push("description = ").push_bind_unseparated(input.description.clone());
    assignments.push("field_stock = ").push_bind_unseparated(input.field_stock);
    assignments.push("unit_conversion = ").push_bind_unseparated(input.unit_conversion);
    assignments.push("daily_consumption = ").push_bind_unseparated(input.daily_consumption);
    assignments.push("min_days_coverage = ").push_bind_unseparated(input.min_days_coverage);
    assignments.push("status = ").push_bind_unseparated(metrics.status.as_str());
    assignments.push("last_updated = ").push_bind_unseparated(now);
    if caps.level_gauge {
        assignments.push("level = ").push_bind_unseparated(input.level);
        assignments
            .push("level_conversion = ")
            .push_bind_unseparated(input.level_conversion);
        assignments.push("has_level = ").push_bind_unseparated(input.has_level);
    }
    if caps.calculation_mode {
        assignments
            .push("calculation_mode = ")
            .push_bind_unseparated(input.calculation_mode.as_str());
        assignments
            .push("custom_conversion_factor = ")
            .push_bind_unseparated(input.custom_conversion_factor);
    }

    qb.push(" WHERE id = ");
    qb.push_bind(item_id);

    qb.build().execute(&mut **tx).await?;
    Ok(())
}
