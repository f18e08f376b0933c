//! Cost computation

use super::{quantize, CostBreakdown, RateCard};
use crate::config::{BillingConfig, ClusterLoadBounds, BYTES_PER_GIB, MILLICORES_PER_CORE};
use crate::efficiency::EfficiencyCalculator;
use crate::models::ResourceMetricsSnapshot;
use crate::{BillingError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Cold-start price multiplier for a cluster load percentage
pub fn cluster_load_factor(load_percent: Decimal, bounds: &ClusterLoadBounds) -> Decimal {
    let raw = Decimal::ONE + (load_percent - bounds.baseline_percent) / dec!(100);
    raw.clamp(bounds.min_factor, bounds.max_factor)
}

/// Multiplier rewarding efficient workloads and surcharging wasteful ones.
///
/// `100 / efficiency` clamped to `[min, max]`, rounded half-up to three
/// places. Zero or negative efficiency yields `max`, and so do crossed
/// bounds.
pub fn efficiency_factor(efficiency: Decimal, min: Decimal, max: Decimal) -> Decimal {
    let factor = if efficiency <= Decimal::ZERO {
        max
    } else {
        (dec!(100) / efficiency).max(min).min(max)
    };
    factor.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

fn overflow() -> BillingError {
    BillingError::invalid("snapshot", "cost arithmetic overflowed")
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(overflow)
}

/// Converts a metrics snapshot and a rate card into a cost breakdown
#[derive(Clone)]
pub struct CostCalculator {
    config: Arc<BillingConfig>,
    efficiency: EfficiencyCalculator,
}

impl CostCalculator {
    pub fn new(config: Arc<BillingConfig>) -> Self {
        Self {
            config,
            efficiency: EfficiencyCalculator::new(),
        }
    }

    /// Compute the breakdown for `period_hours`.
    ///
    /// `cluster_load` is the cluster's average load percentage; without it
    /// cold starts are charged at the flat penalty.
    pub fn compute(
        &self,
        snapshot: &ResourceMetricsSnapshot,
        rates: &RateCard,
        period_hours: Decimal,
        cluster_load: Option<Decimal>,
    ) -> Result<CostBreakdown> {
        if period_hours < Decimal::ZERO {
            return Err(BillingError::invalid(
                "period_hours",
                format!("{period_hours} is negative"),
            ));
        }
        snapshot.validate()?;

        let cpu_hours = mul(
            snapshot.total_cpu_request / Decimal::from(MILLICORES_PER_CORE),
            period_hours,
        )?;
        let memory_gb_hours = mul(
            Decimal::from(snapshot.total_memory_request) / Decimal::from(BYTES_PER_GIB),
            period_hours,
        )?;
        let cpu_cost = mul(cpu_hours, rates.cpu_rate_per_hour)?;
        let memory_cost = mul(memory_gb_hours, rates.memory_rate_per_gb_hour)?;
        let cold_start_cost = self.cold_start_cost(snapshot.cold_start_count, rates, cluster_load)?;

        let efficiency = self.efficiency.pricing_efficiency(snapshot);
        let factor = efficiency_factor(
            efficiency,
            rates.min_efficiency_factor,
            rates.max_efficiency_factor,
        );

        let resource_cost = cpu_cost
            .checked_add(memory_cost)
            .and_then(|sum| sum.checked_add(cold_start_cost))
            .ok_or_else(overflow)?;
        let base_cost = mul(resource_cost, factor)?;
        let final_cost = mul(base_cost, rates.platform_fee_rate)?;
        let fixed_plan_cost = self.fixed_plan_cost(rates.monthly_price, period_hours)?;

        // derived figures come from the rounded ones so they add up as shown
        let base_cost = quantize(base_cost);
        let final_cost = quantize(final_cost);
        let fixed_plan_cost = quantize(fixed_plan_cost);
        let total_cost = final_cost.checked_add(fixed_plan_cost).ok_or_else(overflow)?;

        Ok(CostBreakdown {
            cpu_hours: quantize(cpu_hours),
            memory_gb_hours: quantize(memory_gb_hours),
            cold_start_count: snapshot.cold_start_count,
            average_efficiency: efficiency
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            cpu_cost: quantize(cpu_cost),
            memory_cost: quantize(memory_cost),
            cold_start_cost: quantize(cold_start_cost),
            efficiency_factor: factor,
            base_cost,
            platform_fee: final_cost - base_cost,
            final_cost,
            fixed_plan_cost,
            total_cost,
        })
    }

    fn cold_start_cost(
        &self,
        count: u64,
        rates: &RateCard,
        cluster_load: Option<Decimal>,
    ) -> Result<Decimal> {
        if count == 0 {
            return Ok(Decimal::ZERO);
        }
        let flat = mul(Decimal::from(count), rates.cold_start_penalty)?;
        match cluster_load {
            Some(load) => mul(flat, cluster_load_factor(load, &self.config.cluster_load)),
            None => Ok(flat),
        }
    }

    /// Monthly subscription price prorated over the period
    fn fixed_plan_cost(&self, monthly_price: Decimal, period_hours: Decimal) -> Result<Decimal> {
        if monthly_price.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let hourly = monthly_price
            .checked_div(self.config.hours_per_month)
            .ok_or_else(|| BillingError::Config("hours_per_month must be positive".to_string()))?;
        mul(hourly, period_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackRates;

    fn calculator() -> CostCalculator {
        CostCalculator::new(Arc::new(BillingConfig::default()))
    }

    fn fallback() -> RateCard {
        RateCard::fallback(&FallbackRates::default())
    }

    #[test]
    fn test_efficiency_factor_bounds() {
        let (min, max) = (dec!(0.7), dec!(1.3));
        for e in [dec!(0), dec!(-5), dec!(1), dec!(33.3), dec!(76.9), dec!(100), dec!(250)] {
            let f = efficiency_factor(e, min, max);
            assert!(f >= min && f <= max, "factor {} for efficiency {}", f, e);
        }
        assert_eq!(efficiency_factor(dec!(0), min, max), dec!(1.3));
        assert_eq!(efficiency_factor(dec!(80), min, max), dec!(1.25));
        assert_eq!(efficiency_factor(dec!(100), min, max), dec!(1.000));
        assert_eq!(efficiency_factor(dec!(200), min, max), dec!(0.7));
    }

    #[test]
    fn test_efficiency_factor_rounds_half_up() {
        assert_eq!(efficiency_factor(dec!(90), dec!(0.7), dec!(1.3)), dec!(1.111));
        assert_eq!(efficiency_factor(dec!(88.8), dec!(0.7), dec!(1.3)), dec!(1.126));
        // a midpoint bound rounds away from zero
        assert_eq!(efficiency_factor(dec!(200), dec!(0.7005), dec!(1.3)), dec!(0.701));
    }

    #[test]
    fn test_load_factor_bounds() {
        let bounds = ClusterLoadBounds::default();
        assert_eq!(cluster_load_factor(dec!(50), &bounds), dec!(1));
        assert_eq!(cluster_load_factor(dec!(100), &bounds), dec!(1.5));
        assert_eq!(cluster_load_factor(dec!(0), &bounds), dec!(0.8));
        assert_eq!(cluster_load_factor(dec!(250), &bounds), dec!(1.5));
        assert_eq!(cluster_load_factor(dec!(60), &bounds), dec!(1.1));
    }

    #[test]
    fn test_zero_cold_starts_cost_nothing_under_load() {
        let snapshot = ResourceMetricsSnapshot::from_requests(1000, BYTES_PER_GIB, 0, dec!(100));
        let breakdown = calculator()
            .compute(&snapshot, &fallback(), dec!(1), Some(dec!(100)))
            .unwrap();
        assert_eq!(breakdown.cold_start_cost, Decimal::ZERO);
    }

    #[test]
    fn test_negative_period_rejected() {
        let snapshot = ResourceMetricsSnapshot::from_requests(1000, BYTES_PER_GIB, 0, dec!(100));
        let result = calculator().compute(&snapshot, &fallback(), dec!(-1), None);
        assert!(matches!(
            result,
            Err(BillingError::InvalidInput { field: "period_hours", .. })
        ));
    }

    #[test]
    fn test_zero_period_costs_nothing() {
        let snapshot = ResourceMetricsSnapshot::from_requests(4000, 8 * BYTES_PER_GIB, 0, dec!(50));
        let mut rates = fallback();
        rates.monthly_price = dec!(99.99);

        let breakdown = calculator().compute(&snapshot, &rates, Decimal::ZERO, None).unwrap();
        assert_eq!(breakdown.total_cost, Decimal::ZERO);
        assert_eq!(breakdown.efficiency_factor, dec!(1.3));
    }

    #[test]
    fn test_fixed_cost_prorated_over_730_hours() {
        let snapshot = ResourceMetricsSnapshot::from_requests(0, 0, 0, dec!(100));
        let mut rates = fallback();
        rates.monthly_price = dec!(73);

        let breakdown = calculator().compute(&snapshot, &rates, dec!(10), None).unwrap();
        assert_eq!(breakdown.fixed_plan_cost, dec!(1));
        assert_eq!(breakdown.final_cost, Decimal::ZERO);
        assert_eq!(breakdown.total_cost, dec!(1));
    }

    #[test]
    fn test_consistency_on_presented_figures() {
        let snapshot = ResourceMetricsSnapshot::from_requests(1337, 777_777_777, 7, dec!(61.7));
        let mut rates = fallback();
        rates.monthly_price = dec!(29.99);

        let b = calculator()
            .compute(&snapshot, &rates, dec!(0.01667), Some(dec!(73)))
            .unwrap();
        assert_eq!(b.total_cost, b.final_cost + b.fixed_plan_cost);
        assert_eq!(b.platform_fee, b.final_cost - b.base_cost);
        assert!(b.platform_fee >= Decimal::ZERO);
    }

    #[test]
    fn test_crossed_bounds_do_not_panic() {
        assert_eq!(efficiency_factor(dec!(50), dec!(1.5), dec!(1.3)), dec!(1.3));
        assert_eq!(efficiency_factor(dec!(200), dec!(1.5), dec!(1.3)), dec!(1.3));
    }

    #[test]
    fn test_plan_bound_crossing_fallback_bound_computes() {
        let mut plan = crate::tariff::TariffPlan::bootstrap_entry(
            &FallbackRates::default(),
            &Default::default(),
        );
        plan.min_efficiency_factor = Some(dec!(1.5));
        plan.max_efficiency_factor = None;
        let (rates, _) = RateCard::resolve(Some(&plan), &FallbackRates::default());

        let snapshot = ResourceMetricsSnapshot::from_requests(1000, BYTES_PER_GIB, 0, dec!(50));
        let breakdown = calculator().compute(&snapshot, &rates, dec!(1), None).unwrap();
        assert_eq!(breakdown.efficiency_factor, dec!(1.3));
    }

    #[test]
    fn test_total_overflow_is_an_input_error() {
        let snapshot = ResourceMetricsSnapshot::from_requests(10_000_000_000, 0, 0, dec!(100));
        let mut rates = fallback();
        rates.cpu_rate_per_hour = Decimal::from(5_000_000_000_000_000_000u64);
        rates.platform_fee_rate = Decimal::ONE;
        rates.monthly_price = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);

        let result = calculator().compute(&snapshot, &rates, dec!(730), None);
        assert!(matches!(result, Err(BillingError::InvalidInput { .. })));
    }
}
