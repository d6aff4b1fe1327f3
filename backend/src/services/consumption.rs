//! Consumption estimation: item-history rate, category median, and the
//! fallback resolver
//!
//! Estimates are memoized in a [`ConsumptionContext`] scoped to one unit of
//! work (a single mutation or batch refresh). The context is never stored in
//! application state: a concurrent write invalidates any estimate, so a later
//! request must always start from fresh history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use shared::models::ResolvedConsumption;

use crate::error::AppResult;
use crate::services::schema::SchemaCapabilities;

/// Request-scoped memo for estimator results
#[derive(Debug, Default)]
pub struct ConsumptionContext {
    item_rates: HashMap<i64, Option<Decimal>>,
    category_rates: HashMap<String, Option<Decimal>>,
}

impl ConsumptionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Estimator queries against history and peer items
#[derive(Clone)]
pub struct ConsumptionService {
    db: PgPool,
    caps: SchemaCapabilities,
}

impl ConsumptionService {
    pub fn new(db: PgPool, caps: SchemaCapabilities) -> Self {
        Self { db, caps }
    }

    /// Resolve the daily consumption for an item through the fallback chain.
    ///
    /// `item_id` is absent on create, which skips the item-history tier.
    pub async fn resolve(
        &self,
        ctx: &mut ConsumptionContext,
        manual: Decimal,
        item_id: Option<i64>,
        category: &str,
        effective_stock: Decimal,
        min_days_coverage: i32,
    ) -> AppResult<ResolvedConsumption> {
        if manual > Decimal::ZERO {
            return Ok(ResolvedConsumption::manual(manual));
        }

        let item_rate = match item_id {
            Some(id) => self.item_history_rate(ctx, id).await?,
            None => None,
        };
        if let Some(rate) = item_rate.filter(|r| *r > Decimal::ZERO) {
            return Ok(ResolvedConsumption::item_history(rate));
        }

        let category_rate = self.category_rate(ctx, category).await?;
        if let Some(rate) = category_rate.filter(|r| *r > Decimal::ZERO) {
            return Ok(ResolvedConsumption::category_median(rate));
        }

        Ok(resolve_remainder(effective_stock, min_days_coverage))
    }

    /// Median usage rate from the item's own history, memoized per item for
    /// the unit of work
    pub async fn item_history_rate(
        &self,
        ctx: &mut ConsumptionContext,
        item_id: i64,
    ) -> AppResult<Option<Decimal>> {
        if let Some(rate) = ctx.item_rates.get(&item_id) {
            return Ok(*rate);
        }

        let snapshots: Vec<(DateTime<Utc>, Decimal)> = sqlx::query_as(
            r#"
            SELECT created_at, total_stock_new
            FROM item_stock_history
            WHERE item_id = $1
              AND total_stock_old IS NOT NULL
              AND total_stock_new IS NOT NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        let rates = usage_rates(&snapshots);
        let rate = median(&rates);
        ctx.item_rates.insert(item_id, rate);
        Ok(rate)
    }

    /// Median of manually set rates across active items in the category,
    /// memoized per category for the unit of work
    pub async fn category_rate(
        &self,
        ctx: &mut ConsumptionContext,
        category: &str,
    ) -> AppResult<Option<Decimal>> {
        if let Some(rate) = ctx.category_rates.get(category) {
            return Ok(*rate);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT daily_consumption FROM items WHERE daily_consumption > 0 AND category = ",
        );
        qb.push_bind(category);
        if self.caps.soft_delete {
            qb.push(" AND deleted_at IS NULL");
        }

        let values: Vec<Decimal> = qb.build_query_scalar().fetch_all(&self.db).await?;

        let rate = median(&values);
        ctx.category_rates.insert(category.to_string(), rate);
        Ok(rate)
    }
}

/// The two bottom tiers of the fallback chain: rule-based estimate when the
/// inputs allow it, otherwise the default floor
pub fn resolve_remainder(effective_stock: Decimal, min_days_coverage: i32) -> ResolvedConsumption {
    if effective_stock > Decimal::ZERO && min_days_coverage > 0 {
        return ResolvedConsumption::rule_based(effective_stock / Decimal::from(min_days_coverage));
    }
    ResolvedConsumption::default_floor()
}

/// Pure fallback chain over already-computed estimates, used by tests and by
/// callers that have both estimates in hand
pub fn resolve_from(
    manual: Decimal,
    item_rate: Option<Decimal>,
    category_rate: Option<Decimal>,
    effective_stock: Decimal,
    min_days_coverage: i32,
) -> ResolvedConsumption {
    if manual > Decimal::ZERO {
        return ResolvedConsumption::manual(manual);
    }
    if let Some(rate) = item_rate.filter(|r| *r > Decimal::ZERO) {
        return ResolvedConsumption::item_history(rate);
    }
    if let Some(rate) = category_rate.filter(|r| *r > Decimal::ZERO) {
        return ResolvedConsumption::category_median(rate);
    }
    resolve_remainder(effective_stock, min_days_coverage)
}

/// Per-day usage rates from a time-ascending series of effective-stock
/// snapshots.
///
/// Only decreasing intervals with positive elapsed time count; increases are
/// replenishments, not usage signal.
pub fn usage_rates(snapshots: &[(DateTime<Utc>, Decimal)]) -> Vec<Decimal> {
    const SECONDS_PER_DAY: i64 = 86_400;

    snapshots
        .windows(2)
        .filter_map(|pair| {
            let (prev_at, prev_stock) = pair[0];
            let (curr_at, curr_stock) = pair[1];
            let elapsed_seconds = (curr_at - prev_at).num_seconds();
            if elapsed_seconds <= 0 || prev_stock <= curr_stock {
                return None;
            }
            let elapsed_days =
                Decimal::from(elapsed_seconds) / Decimal::from(SECONDS_PER_DAY);
            Some((prev_stock - curr_stock) / elapsed_days)
        })
        .collect()
}

/// Median, averaging the two central values for even counts
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / Decimal::TWO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::models::{classify_status, ConsumptionSource, StockStatus};
    use std::str::FromStr;

    use crate::services::stock_calc::days_coverage;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn at_day(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[dec("20"), dec("10")]), Some(dec("15")));
        assert_eq!(median(&[dec("3"), dec("1"), dec("2")]), Some(dec("2")));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_resists_outliers() {
        // One stock correction of 500/day does not drag the estimate
        let rates = [dec("10"), dec("12"), dec("11"), dec("500")];
        assert_eq!(median(&rates), Some(dec("11.5")));
    }

    #[test]
    fn test_usage_rates_two_decreasing_intervals() {
        // 100 -> 60 over 2 days, 60 -> 40 over 2 days
        let snapshots = [
            (at_day(1), dec("100")),
            (at_day(3), dec("60")),
            (at_day(5), dec("40")),
        ];
        let rates = usage_rates(&snapshots);
        assert_eq!(rates, vec![dec("20"), dec("10")]);
        assert_eq!(median(&rates), Some(dec("15")));
    }

    #[test]
    fn test_usage_rates_ignores_replenishment() {
        let snapshots = [
            (at_day(1), dec("40")),
            (at_day(2), dec("200")),
            (at_day(4), dec("180")),
        ];
        let rates = usage_rates(&snapshots);
        assert_eq!(rates, vec![dec("10")]);
    }

    #[test]
    fn test_usage_rates_ignores_zero_elapsed() {
        let t = at_day(1);
        let snapshots = [(t, dec("100")), (t, dec("50"))];
        assert!(usage_rates(&snapshots).is_empty());
    }

    #[test]
    fn test_usage_rates_needs_two_snapshots() {
        assert!(usage_rates(&[(at_day(1), dec("100"))]).is_empty());
        assert!(usage_rates(&[]).is_empty());
    }

    #[test]
    fn test_resolver_manual_wins() {
        let resolved = resolve_from(dec("5"), Some(dec("99")), Some(dec("42")), dec("100"), 7);
        assert_eq!(resolved.source, ConsumptionSource::Manual);
        assert_eq!(resolved.value, dec("5"));
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn test_resolver_item_history_next() {
        let resolved = resolve_from(Decimal::ZERO, Some(dec("15")), Some(dec("42")), dec("100"), 7);
        assert_eq!(resolved.source, ConsumptionSource::ItemHistory);
        assert_eq!(resolved.value, dec("15"));
        assert_eq!(resolved.confidence, 0.85);
    }

    #[test]
    fn test_resolver_category_median_next() {
        let resolved = resolve_from(Decimal::ZERO, None, Some(dec("42")), dec("100"), 7);
        assert_eq!(resolved.source, ConsumptionSource::CategoryMedian);
        assert_eq!(resolved.value, dec("42"));
        assert_eq!(resolved.confidence, 0.65);
    }

    #[test]
    fn test_resolver_rule_based() {
        let resolved = resolve_from(Decimal::ZERO, None, None, dec("100"), 7);
        assert_eq!(resolved.source, ConsumptionSource::RuleBased);
        assert_eq!(resolved.value, dec("100") / dec("7"));
        assert_eq!(resolved.confidence, 0.4);
    }

    #[test]
    fn test_resolver_default_floor() {
        let resolved = resolve_from(Decimal::ZERO, None, None, Decimal::ZERO, 7);
        assert_eq!(resolved.source, ConsumptionSource::Default);
        assert_eq!(resolved.value, dec("0.1"));
        assert_eq!(resolved.confidence, 0.2);
    }

    #[test]
    fn test_end_to_end_rule_based_scenario() {
        // Create: field_stock=50, unit_conversion=2, no manual rate, no
        // history, no category peers, min_days_coverage=7
        let effective = dec("50") * dec("2");
        let resolved = resolve_from(Decimal::ZERO, None, None, effective, 7);
        assert_eq!(resolved.source, ConsumptionSource::RuleBased);

        let days = days_coverage(effective, resolved.value);
        assert_eq!(days, 6);
        assert_eq!(classify_status(days, 7), StockStatus::LowStock);
    }
}
