//! Validation utilities for the Site Stock Management Platform
//!
//! Pure field-level checks used by the item mutation service. Each returns a
//! human-readable message on failure; the service collects them into a list
//! and aborts before any write.

use rust_decimal::Decimal;

use crate::models::CalculationMode;

/// Validate item name is non-empty
pub fn validate_item_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Item name cannot be empty");
    }
    if name.len() > 200 {
        return Err("Item name must be at most 200 characters");
    }
    Ok(())
}

/// Validate category label is non-empty (activity is checked against the
/// category collaborator separately)
pub fn validate_category_name(category: &str) -> Result<(), &'static str> {
    if category.trim().is_empty() {
        return Err("Category cannot be empty");
    }
    Ok(())
}

/// Validate unit label is non-empty
pub fn validate_unit_label(unit: &str) -> Result<(), &'static str> {
    if unit.trim().is_empty() {
        return Err("Unit label cannot be empty");
    }
    Ok(())
}

/// Validate raw field count is a non-negative integer
pub fn validate_field_stock(field_stock: i32) -> Result<(), &'static str> {
    if field_stock < 0 {
        return Err("Field stock cannot be negative");
    }
    Ok(())
}

/// Validate the unit conversion factor is strictly positive
pub fn validate_unit_conversion(factor: Decimal) -> Result<(), &'static str> {
    if factor <= Decimal::ZERO {
        return Err("Unit conversion factor must be positive");
    }
    Ok(())
}

/// Validate the level gauge reading when the gauge participates in
/// stock calculation
pub fn validate_level(level: Option<i32>, has_level: bool) -> Result<(), &'static str> {
    if !has_level {
        return Ok(());
    }
    match level {
        None => Err("Level reading is required when the level gauge is enabled"),
        Some(l) if l < 0 => Err("Level reading cannot be negative"),
        Some(_) => Ok(()),
    }
}

/// Validate the level conversion factor when provided
pub fn validate_level_conversion(factor: Option<Decimal>) -> Result<(), &'static str> {
    match factor {
        Some(f) if f < Decimal::ZERO => Err("Level conversion factor cannot be negative"),
        _ => Ok(()),
    }
}

/// Validate the custom conversion factor against the calculation mode
pub fn validate_custom_factor(
    mode: CalculationMode,
    custom_factor: Option<Decimal>,
) -> Result<(), &'static str> {
    if mode != CalculationMode::Multiplied {
        return Ok(());
    }
    match custom_factor {
        None => Err("A custom conversion factor is required in multiplied mode"),
        Some(f) if f <= Decimal::ZERO => {
            Err("Custom conversion factor must be positive in multiplied mode")
        }
        Some(_) => Ok(()),
    }
}

/// Validate manual daily consumption; zero means "unset, estimate it"
pub fn validate_daily_consumption(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Daily consumption cannot be negative");
    }
    Ok(())
}

/// Validate the low-stock threshold
pub fn validate_min_days_coverage(days: i32) -> Result<(), &'static str> {
    if days < 1 {
        return Err("Minimum days coverage must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_item_name() {
        assert!(validate_item_name("Diesel 200L drum").is_ok());
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("   ").is_err());
        assert!(validate_item_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_field_stock() {
        assert!(validate_field_stock(0).is_ok());
        assert!(validate_field_stock(50).is_ok());
        assert!(validate_field_stock(-1).is_err());
    }

    #[test]
    fn test_validate_unit_conversion() {
        assert!(validate_unit_conversion(dec("2.5")).is_ok());
        assert!(validate_unit_conversion(Decimal::ZERO).is_err());
        assert!(validate_unit_conversion(dec("-1")).is_err());
    }

    #[test]
    fn test_validate_level_requires_reading_when_enabled() {
        assert!(validate_level(None, false).is_ok());
        assert!(validate_level(None, true).is_err());
        assert!(validate_level(Some(-3), true).is_err());
        assert!(validate_level(Some(0), true).is_ok());
        assert!(validate_level(Some(120), true).is_ok());
    }

    #[test]
    fn test_validate_level_conversion() {
        assert!(validate_level_conversion(None).is_ok());
        assert!(validate_level_conversion(Some(dec("1.5"))).is_ok());
        assert!(validate_level_conversion(Some(dec("-0.1"))).is_err());
    }

    #[test]
    fn test_validate_custom_factor_multiplied_mode() {
        assert!(validate_custom_factor(CalculationMode::Combined, None).is_ok());
        assert!(validate_custom_factor(CalculationMode::Multiplied, None).is_err());
        assert!(validate_custom_factor(CalculationMode::Multiplied, Some(Decimal::ZERO)).is_err());
        assert!(validate_custom_factor(CalculationMode::Multiplied, Some(dec("0.5"))).is_ok());
    }

    #[test]
    fn test_validate_daily_consumption() {
        assert!(validate_daily_consumption(Decimal::ZERO).is_ok());
        assert!(validate_daily_consumption(dec("4.2")).is_ok());
        assert!(validate_daily_consumption(dec("-0.5")).is_err());
    }

    #[test]
    fn test_validate_min_days_coverage() {
        assert!(validate_min_days_coverage(1).is_ok());
        assert!(validate_min_days_coverage(30).is_ok());
        assert!(validate_min_days_coverage(0).is_err());
        assert!(validate_min_days_coverage(-7).is_err());
    }
}
