//! Pricing model
//!
//! This module provides:
//! - `RateCard`: the rates a computation runs with, resolved field by field
//!   from a tariff plan and the configured fallbacks
//! - `CostBreakdown`: the itemized result of one cost computation
//! - `CostCalculator`: snapshot + rates + period into a breakdown

mod calculator;

pub use calculator::{cluster_load_factor, efficiency_factor, CostCalculator};

use crate::config::FallbackRates;
use crate::error::Degradation;
use crate::tariff::{TariffPlan, TariffResolution};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Money and quantity figures are presented with four decimal places
pub const MONEY_DP: u32 = 4;

/// Round to the presentation precision (banker's rounding)
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

/// Fully resolved rates for one computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub cpu_rate_per_hour: Decimal,
    pub memory_rate_per_gb_hour: Decimal,
    pub cold_start_penalty: Decimal,
    pub platform_fee_rate: Decimal,
    pub min_efficiency_factor: Decimal,
    pub max_efficiency_factor: Decimal,
    /// Zero when billing without a plan
    pub monthly_price: Decimal,
}

impl RateCard {
    /// Rates used when no tariff resolved at all
    pub fn fallback(rates: &FallbackRates) -> Self {
        Self {
            cpu_rate_per_hour: rates.cpu_rate_per_hour,
            memory_rate_per_gb_hour: rates.memory_rate_per_gb_hour,
            cold_start_penalty: rates.cold_start_penalty,
            platform_fee_rate: rates.platform_fee_rate,
            min_efficiency_factor: rates.min_efficiency_factor,
            max_efficiency_factor: rates.max_efficiency_factor,
            monthly_price: Decimal::ZERO,
        }
    }

    /// Resolve rates from `plan`, falling back per field. Returns the card
    /// and the names of the fields that fell back.
    ///
    /// Efficiency bounds that end up crossed are both replaced by the
    /// fallback bounds.
    pub fn resolve(plan: Option<&TariffPlan>, rates: &FallbackRates) -> (Self, Vec<String>) {
        let Some(plan) = plan else {
            return (Self::fallback(rates), Vec::new());
        };

        let mut missing = Vec::new();
        let mut pick = |name: &str, value: Option<Decimal>, default: Decimal| {
            value.unwrap_or_else(|| {
                missing.push(name.to_string());
                default
            })
        };

        let mut card = Self {
            cpu_rate_per_hour: pick("cpu_rate_per_hour", plan.cpu_rate_per_hour, rates.cpu_rate_per_hour),
            memory_rate_per_gb_hour: pick(
                "memory_rate_per_gb_hour",
                plan.memory_rate_per_gb_hour,
                rates.memory_rate_per_gb_hour,
            ),
            cold_start_penalty: pick("cold_start_penalty", plan.cold_start_penalty, rates.cold_start_penalty),
            platform_fee_rate: pick("platform_fee_rate", plan.platform_fee_rate, rates.platform_fee_rate),
            min_efficiency_factor: pick(
                "min_efficiency_factor",
                plan.min_efficiency_factor,
                rates.min_efficiency_factor,
            ),
            max_efficiency_factor: pick(
                "max_efficiency_factor",
                plan.max_efficiency_factor,
                rates.max_efficiency_factor,
            ),
            monthly_price: plan.monthly_price,
        };

        // a bound taken from the plan can cross one taken from the fallbacks
        if card.min_efficiency_factor > card.max_efficiency_factor {
            card.min_efficiency_factor = rates.min_efficiency_factor;
            card.max_efficiency_factor = rates.max_efficiency_factor;
            for name in ["min_efficiency_factor", "max_efficiency_factor"] {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }

        (card, missing)
    }

    /// Rates for a tariff resolution, with the degradations it implies
    pub fn for_resolution(resolution: &TariffResolution, rates: &FallbackRates) -> (Self, Vec<Degradation>) {
        let mut reasons = Vec::new();
        if let TariffResolution::Unavailable(reason) = resolution {
            reasons.push(Degradation::TariffUnavailable(reason.clone()));
        }
        let (card, missing) = Self::resolve(resolution.plan(), rates);
        if !missing.is_empty() {
            reasons.push(Degradation::FallbackRates(missing));
        }
        (card, reasons)
    }
}

/// Itemized cost of one workload over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub cpu_hours: Decimal,
    pub memory_gb_hours: Decimal,
    pub cold_start_count: u64,
    /// Efficiency the factor was derived from, two decimal places
    pub average_efficiency: Decimal,

    pub cpu_cost: Decimal,
    pub memory_cost: Decimal,
    pub cold_start_cost: Decimal,
    /// Three decimal places
    pub efficiency_factor: Decimal,
    pub base_cost: Decimal,
    pub platform_fee: Decimal,
    pub final_cost: Decimal,
    pub fixed_plan_cost: Decimal,
    pub total_cost: Decimal,
}

impl CostBreakdown {
    /// Sum of the resource line items before efficiency and fees
    pub fn resource_cost(&self) -> Decimal {
        self.cpu_cost + self.memory_cost + self.cold_start_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierCatalog;
    use crate::tariff::PlanTier;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quantize_bankers_rounding() {
        assert_eq!(quantize(dec!(0.00125)), dec!(0.0012));
        assert_eq!(quantize(dec!(0.00135)), dec!(0.0014));
        assert_eq!(quantize(dec!(1.23456789)), dec!(1.2346));
    }

    #[test]
    fn test_resolve_without_plan_uses_fallbacks() {
        let (card, missing) = RateCard::resolve(None, &FallbackRates::default());
        assert_eq!(card, RateCard::fallback(&FallbackRates::default()));
        assert_eq!(card.monthly_price, Decimal::ZERO);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_unavailable_resolution_is_degraded() {
        let resolution = TariffResolution::Unavailable("timed out".to_string());
        let (card, reasons) = RateCard::for_resolution(&resolution, &FallbackRates::default());

        assert_eq!(card.monthly_price, Decimal::ZERO);
        assert_eq!(reasons, vec![Degradation::TariffUnavailable("timed out".to_string())]);
    }

    #[test]
    fn test_resolve_reports_missing_fields() {
        let mut plan = TariffPlan::from_tier(
            PlanTier::Professional,
            &TierCatalog::default().professional,
            &FallbackRates::default(),
        );
        plan.cpu_rate_per_hour = Some(dec!(0.004));
        plan.cold_start_penalty = None;
        plan.platform_fee_rate = None;

        let (card, missing) = RateCard::resolve(Some(&plan), &FallbackRates::default());
        assert_eq!(card.cpu_rate_per_hour, dec!(0.004));
        assert_eq!(card.cold_start_penalty, dec!(0.005));
        assert_eq!(card.platform_fee_rate, dec!(1.3));
        assert_eq!(card.monthly_price, dec!(29.99));
        assert_eq!(missing, vec!["cold_start_penalty", "platform_fee_rate"]);
    }

    #[test]
    fn test_crossed_bounds_fall_back_as_a_pair() {
        let mut plan = TariffPlan::from_tier(
            PlanTier::Enterprise,
            &TierCatalog::default().enterprise,
            &FallbackRates::default(),
        );
        plan.min_efficiency_factor = Some(dec!(1.5));
        plan.max_efficiency_factor = None;

        let (card, missing) = RateCard::resolve(Some(&plan), &FallbackRates::default());
        assert_eq!(card.min_efficiency_factor, dec!(0.7));
        assert_eq!(card.max_efficiency_factor, dec!(1.3));
        assert_eq!(missing, vec!["max_efficiency_factor", "min_efficiency_factor"]);

        let resolution = TariffResolution::Subscription(plan);
        let (_, reasons) = RateCard::for_resolution(&resolution, &FallbackRates::default());
        assert_eq!(
            reasons,
            vec![Degradation::FallbackRates(vec![
                "max_efficiency_factor".to_string(),
                "min_efficiency_factor".to_string(),
            ])]
        );
    }
}
