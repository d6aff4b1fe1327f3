//! Stock-coverage engine: effective stock, days of coverage, status
//!
//! Pure composition layer over the shared calculation primitives. Everything
//! here is recomputed fully from current inputs on every call; nothing is
//! carried over between mutations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use shared::models::{
    classify_status, effective_stock, CalculationMode, ResolvedConsumption, StockStatus,
};

/// Raw quantity fields feeding the engine, taken either from a validated
/// input or from a fetched item row
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    pub field_stock: i32,
    pub unit_conversion: Decimal,
    pub level: Option<i32>,
    pub has_level: bool,
    pub calculation_mode: CalculationMode,
    pub level_conversion: Option<Decimal>,
    pub custom_conversion_factor: Option<Decimal>,
    pub min_days_coverage: i32,
}

impl StockSnapshot {
    /// In multiplied mode the custom factor takes the level-conversion slot
    fn level_factor(&self) -> Option<Decimal> {
        match self.calculation_mode {
            CalculationMode::Multiplied => self.custom_conversion_factor,
            CalculationMode::Combined => self.level_conversion,
        }
    }

    pub fn effective_stock(&self) -> Decimal {
        effective_stock(
            self.field_stock,
            self.unit_conversion,
            self.level,
            self.has_level,
            self.calculation_mode,
            self.level_factor(),
        )
    }

    /// The conversion factor recorded on history rows for this snapshot
    pub fn conversion_factor_used(&self) -> Decimal {
        if self.has_level && self.calculation_mode == CalculationMode::Multiplied {
            self.custom_conversion_factor
                .unwrap_or(self.unit_conversion)
        } else {
            self.unit_conversion
        }
    }
}

/// Whole days the effective stock is expected to last.
///
/// A non-positive consumption yields zero coverage; the resolver's default
/// floor means that should not occur in practice.
pub fn days_coverage(effective_stock: Decimal, daily_consumption: Decimal) -> i64 {
    if daily_consumption <= Decimal::ZERO {
        return 0;
    }
    (effective_stock / daily_consumption)
        .floor()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Derived metrics for one side (old or new) of a mutation
#[derive(Debug, Clone)]
pub struct ItemMetrics {
    pub effective_stock: Decimal,
    pub resolved: ResolvedConsumption,
    pub days_coverage: i64,
    pub status: StockStatus,
}

pub fn metrics_from(snapshot: &StockSnapshot, resolved: ResolvedConsumption) -> ItemMetrics {
    let effective = snapshot.effective_stock();
    let days = days_coverage(effective, resolved.value);
    let status = classify_status(days, snapshot.min_days_coverage);
    ItemMetrics {
        effective_stock: effective,
        days_coverage: days,
        status,
        resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn snapshot() -> StockSnapshot {
        StockSnapshot {
            field_stock: 50,
            unit_conversion: dec("2"),
            level: None,
            has_level: false,
            calculation_mode: CalculationMode::Combined,
            level_conversion: None,
            custom_conversion_factor: None,
            min_days_coverage: 7,
        }
    }

    #[test]
    fn test_days_coverage_floors() {
        assert_eq!(days_coverage(dec("100"), dec("15")), 6);
        assert_eq!(days_coverage(dec("100"), dec("10")), 10);
        assert_eq!(days_coverage(dec("9.9"), dec("10")), 0);
    }

    #[test]
    fn test_days_coverage_zero_consumption() {
        assert_eq!(days_coverage(dec("100"), Decimal::ZERO), 0);
        assert_eq!(days_coverage(dec("100"), dec("-3")), 0);
    }

    #[test]
    fn test_multiplied_mode_uses_custom_factor() {
        let snap = StockSnapshot {
            field_stock: 4,
            unit_conversion: dec("2"),
            level: Some(80),
            has_level: true,
            calculation_mode: CalculationMode::Multiplied,
            level_conversion: Some(dec("9.9")),
            custom_conversion_factor: Some(dec("0.5")),
            min_days_coverage: 7,
        };
        // 0.5 x 80 x 4, the stored level_conversion plays no part
        assert_eq!(snap.effective_stock(), dec("160"));
        assert_eq!(snap.conversion_factor_used(), dec("0.5"));
    }

    #[test]
    fn test_combined_mode_factor_used_is_unit_conversion() {
        let mut snap = snapshot();
        snap.has_level = true;
        snap.level = Some(100);
        snap.level_conversion = Some(dec("1.5"));
        assert_eq!(snap.conversion_factor_used(), dec("2"));
    }

    #[test]
    fn test_metrics_from_classifies() {
        let m = metrics_from(&snapshot(), ResolvedConsumption::manual(dec("10")));
        assert_eq!(m.effective_stock, dec("100"));
        assert_eq!(m.days_coverage, 10);
        assert_eq!(m.status, StockStatus::WarningStock);
    }
}
