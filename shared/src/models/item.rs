//! Item models and stock status classification

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked inventory item held at a remote site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// Unit label for the field count (e.g. "drum", "sack", "cylinder")
    pub unit: String,
    pub description: Option<String>,
    /// Raw field count reported by site staff
    pub field_stock: i32,
    /// Weight of one field unit
    pub unit_conversion: Decimal,
    /// Gauge reading in cm, present only for items with a level gauge
    pub level: Option<i32>,
    pub level_conversion: Option<Decimal>,
    /// Whether the level gauge participates in stock calculation
    pub has_level: bool,
    pub calculation_mode: CalculationMode,
    /// Required when calculation_mode is Multiplied
    pub custom_conversion_factor: Option<Decimal>,
    /// Manual daily consumption override; zero means "unset, estimate it"
    pub daily_consumption: Decimal,
    /// Threshold distinguishing low/warning/in-stock bands, whole days
    pub min_days_coverage: i32,
    pub status: StockStatus,
    pub last_updated: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl Item {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// How field count and level gauge combine into effective stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    /// level x level_conversion + field_stock x unit_conversion
    #[default]
    Combined,
    /// custom_factor x level x field_stock
    Multiplied,
}

impl CalculationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMode::Combined => "combined",
            CalculationMode::Multiplied => "multiplied",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "combined" => Some(CalculationMode::Combined),
            "multiplied" => Some(CalculationMode::Multiplied),
            _ => None,
        }
    }
}

/// Operational stock state derived from days of coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    InStock,
    LowStock,
    WarningStock,
    OutStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in-stock",
            StockStatus::LowStock => "low-stock",
            StockStatus::WarningStock => "warning-stock",
            StockStatus::OutStock => "out-stock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in-stock" => Some(StockStatus::InStock),
            "low-stock" => Some(StockStatus::LowStock),
            "warning-stock" => Some(StockStatus::WarningStock),
            "out-stock" => Some(StockStatus::OutStock),
            _ => None,
        }
    }
}

/// Classify days of coverage into a stock status.
///
/// Stateless: recomputed fully from current inputs on every mutation and on
/// batch refresh, so the stored status can never drift from stored quantities.
pub fn classify_status(days_coverage: i64, min_days_coverage: i32) -> StockStatus {
    let min_days = i64::from(min_days_coverage);
    if days_coverage <= 0 {
        StockStatus::OutStock
    } else if days_coverage <= min_days {
        StockStatus::LowStock
    } else if days_coverage <= 2 * min_days {
        StockStatus::WarningStock
    } else {
        StockStatus::InStock
    }
}

/// Effective stock from raw quantities.
///
/// Negative inputs are floored at zero before multiplication, so the result
/// is always finite and non-negative.
pub fn effective_stock(
    field_stock: i32,
    unit_conversion: Decimal,
    level: Option<i32>,
    has_level: bool,
    calculation_mode: CalculationMode,
    level_conversion: Option<Decimal>,
) -> Decimal {
    let field = Decimal::from(field_stock.max(0));
    let unit_factor = unit_conversion.max(Decimal::ZERO);

    if !has_level {
        return field * unit_factor;
    }

    let level = Decimal::from(level.unwrap_or(0).max(0));
    let level_factor = level_conversion.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);

    match calculation_mode {
        CalculationMode::Combined => level * level_factor + field * unit_factor,
        CalculationMode::Multiplied => level_factor * level * field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_effective_stock_without_level() {
        let stock = effective_stock(50, dec("2"), None, false, CalculationMode::Combined, None);
        assert_eq!(stock, dec("100"));
    }

    #[test]
    fn test_effective_stock_ignores_level_when_disabled() {
        let stock = effective_stock(
            50,
            dec("2"),
            Some(120),
            false,
            CalculationMode::Combined,
            Some(dec("3.5")),
        );
        assert_eq!(stock, dec("100"));
    }

    #[test]
    fn test_effective_stock_combined() {
        // 120cm x 1.5 + 10 x 2 = 200
        let stock = effective_stock(
            10,
            dec("2"),
            Some(120),
            true,
            CalculationMode::Combined,
            Some(dec("1.5")),
        );
        assert_eq!(stock, dec("200"));
    }

    #[test]
    fn test_effective_stock_multiplied() {
        // 0.5 x 80 x 4 = 160
        let stock = effective_stock(
            4,
            dec("2"),
            Some(80),
            true,
            CalculationMode::Multiplied,
            Some(dec("0.5")),
        );
        assert_eq!(stock, dec("160"));
    }

    #[test]
    fn test_effective_stock_negative_inputs_floored() {
        let stock = effective_stock(-5, dec("2"), None, false, CalculationMode::Combined, None);
        assert_eq!(stock, Decimal::ZERO);

        let stock = effective_stock(
            3,
            dec("2"),
            Some(-40),
            true,
            CalculationMode::Combined,
            Some(dec("1.5")),
        );
        assert_eq!(stock, dec("6"));
    }

    #[test]
    fn test_classify_status_bands() {
        // min_days_coverage = 7
        assert_eq!(classify_status(0, 7), StockStatus::OutStock);
        assert_eq!(classify_status(-3, 7), StockStatus::OutStock);
        assert_eq!(classify_status(1, 7), StockStatus::LowStock);
        assert_eq!(classify_status(7, 7), StockStatus::LowStock);
        assert_eq!(classify_status(8, 7), StockStatus::WarningStock);
        assert_eq!(classify_status(14, 7), StockStatus::WarningStock);
        assert_eq!(classify_status(15, 7), StockStatus::InStock);
    }

    #[test]
    fn test_classify_status_idempotent() {
        for days in [0, 3, 7, 10, 14, 15, 400] {
            assert_eq!(classify_status(days, 7), classify_status(days, 7));
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            StockStatus::InStock,
            StockStatus::LowStock,
            StockStatus::WarningStock,
            StockStatus::OutStock,
        ] {
            assert_eq!(StockStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(StockStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_calculation_mode_round_trip() {
        assert_eq!(CalculationMode::from_str("combined"), Some(CalculationMode::Combined));
        assert_eq!(CalculationMode::from_str("multiplied"), Some(CalculationMode::Multiplied));
        assert_eq!(CalculationMode::from_str("stacked"), None);
    }
}
