//! Resolved daily consumption with provenance

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a resolved consumption value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumptionSource {
    Manual,
    ItemHistory,
    CategoryMedian,
    RuleBased,
    Default,
}

impl ConsumptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionSource::Manual => "manual",
            ConsumptionSource::ItemHistory => "item-history",
            ConsumptionSource::CategoryMedian => "category-median",
            ConsumptionSource::RuleBased => "rule-based",
            ConsumptionSource::Default => "default",
        }
    }
}

/// The daily usage rate the system decided to use for an item.
///
/// Confidence is informative only; it is surfaced to callers and written into
/// the history provenance note, but no decision branches on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConsumption {
    pub value: Decimal,
    pub source: ConsumptionSource,
    pub confidence: f64,
}

impl ResolvedConsumption {
    pub fn manual(value: Decimal) -> Self {
        Self {
            value,
            source: ConsumptionSource::Manual,
            confidence: 1.0,
        }
    }

    pub fn item_history(value: Decimal) -> Self {
        Self {
            value,
            source: ConsumptionSource::ItemHistory,
            confidence: 0.85,
        }
    }

    pub fn category_median(value: Decimal) -> Self {
        Self {
            value,
            source: ConsumptionSource::CategoryMedian,
            confidence: 0.65,
        }
    }

    pub fn rule_based(value: Decimal) -> Self {
        Self {
            value,
            source: ConsumptionSource::RuleBased,
            confidence: 0.4,
        }
    }

    /// Floor value guaranteeing the classifier never divides by zero
    pub fn default_floor() -> Self {
        Self {
            value: Decimal::new(1, 1),
            source: ConsumptionSource::Default,
            confidence: 0.2,
        }
    }

    /// Provenance note recorded on every history row
    pub fn provenance_note(&self) -> String {
        format!(
            "daily consumption {} ({}, confidence {:.2})",
            self.value.round_dp(2),
            self.source.as_str(),
            self.confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_floor_is_positive() {
        let resolved = ResolvedConsumption::default_floor();
        assert!(resolved.value > Decimal::ZERO);
        assert_eq!(resolved.source, ConsumptionSource::Default);
    }

    #[test]
    fn test_confidence_ordering() {
        let manual = ResolvedConsumption::manual(Decimal::ONE);
        let history = ResolvedConsumption::item_history(Decimal::ONE);
        let category = ResolvedConsumption::category_median(Decimal::ONE);
        let rule = ResolvedConsumption::rule_based(Decimal::ONE);
        let fallback = ResolvedConsumption::default_floor();

        assert!(manual.confidence > history.confidence);
        assert!(history.confidence > category.confidence);
        assert!(category.confidence > rule.confidence);
        assert!(rule.confidence > fallback.confidence);
    }

    #[test]
    fn test_provenance_note_names_source() {
        let note = ResolvedConsumption::rule_based(Decimal::new(1429, 2)).provenance_note();
        assert!(note.contains("rule-based"));
        assert!(note.contains("14.29"));
    }
}
