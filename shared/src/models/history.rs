//! Append-only stock history records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockStatus;

/// What kind of item mutation produced a history row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Insert,
    Update,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Insert => "insert",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(HistoryAction::Insert),
            "update" => Some(HistoryAction::Update),
            "delete" => Some(HistoryAction::Delete),
            _ => None,
        }
    }
}

/// One immutable audit record per item mutation.
///
/// Item name and category are denormalized at write time so the row stays
/// readable after the item is edited or archived. The old side is null for
/// inserts, the new side is null for deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStockHistory {
    pub id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub category: String,
    pub action: HistoryAction,
    pub field_stock_old: Option<i32>,
    pub field_stock_new: Option<i32>,
    pub level_old: Option<i32>,
    pub level_new: Option<i32>,
    pub status_old: Option<StockStatus>,
    pub status_new: Option<StockStatus>,
    pub total_stock_old: Option<Decimal>,
    pub total_stock_new: Option<Decimal>,
    pub days_coverage_old: Option<i64>,
    pub days_coverage_new: Option<i64>,
    pub unit: String,
    /// Conversion factor in effect at the moment of change
    pub conversion_factor: Decimal,
    /// Resolved daily consumption used for the new-side metrics
    pub daily_consumption: Decimal,
    /// Provenance note for the resolved consumption
    pub consumption_source: String,
    pub changed_by: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
