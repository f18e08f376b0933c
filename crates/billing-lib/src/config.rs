//! Engine-wide billing configuration
//!
//! One `BillingConfig` is built at process start and shared by reference
//! (`Arc<BillingConfig>`) with every component. Every field has a default so
//! partial overrides from a file or the environment deserialize cleanly.

use crate::models::BillingPeriod;
use crate::tariff::{PlanLimits, PlanTier};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes in one GiB; memory is always billed in binary gigabytes
pub const BYTES_PER_GIB: u64 = 1 << 30;

/// Millicores in one CPU core
pub const MILLICORES_PER_CORE: u64 = 1000;

/// Default memory request per pod (512 MiB)
pub const DEFAULT_MEMORY_PER_POD: u64 = 512 * 1024 * 1024;

/// Rates used when no tariff resolves, or a tariff lacks a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackRates {
    pub cpu_rate_per_hour: Decimal,
    pub memory_rate_per_gb_hour: Decimal,
    pub cold_start_penalty: Decimal,
    pub platform_fee_rate: Decimal,
    pub min_efficiency_factor: Decimal,
    pub max_efficiency_factor: Decimal,
}

impl Default for FallbackRates {
    fn default() -> Self {
        Self {
            cpu_rate_per_hour: dec!(0.002),
            memory_rate_per_gb_hour: dec!(0.001),
            cold_start_penalty: dec!(0.005),
            platform_fee_rate: dec!(1.3),
            min_efficiency_factor: dec!(0.7),
            max_efficiency_factor: dec!(1.3),
        }
    }
}

/// Cluster-load scaling for cold-start charges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterLoadBounds {
    pub min_factor: Decimal,
    pub max_factor: Decimal,
    /// Load percentage at which the factor is exactly 1.0
    pub baseline_percent: Decimal,
}

impl Default for ClusterLoadBounds {
    fn default() -> Self {
        Self {
            min_factor: dec!(0.8),
            max_factor: dec!(1.5),
            baseline_percent: dec!(50),
        }
    }
}

/// Length in hours of each canonical billing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodHours {
    pub minute: Decimal,
    pub hour: Decimal,
    pub day: Decimal,
    pub month: Decimal,
}

impl Default for PeriodHours {
    fn default() -> Self {
        Self {
            minute: dec!(0.01667),
            hour: dec!(1),
            day: dec!(24),
            month: dec!(720),
        }
    }
}

impl PeriodHours {
    pub fn hours(&self, period: BillingPeriod) -> Decimal {
        match period {
            BillingPeriod::Minute => self.minute,
            BillingPeriod::Hour => self.hour,
            BillingPeriod::Day => self.day,
            BillingPeriod::Month => self.month,
        }
    }
}

/// Catalog entry used to provision a canonical tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefaults {
    pub name: String,
    pub description: String,
    pub monthly_price: Decimal,
    pub limits: PlanLimits,
    #[serde(default)]
    pub includes_support: bool,
    #[serde(default)]
    pub includes_analytics: bool,
    #[serde(default)]
    pub includes_sla: bool,
}

/// Quotas and prices of the three canonical tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCatalog {
    pub starter: TierDefaults,
    pub professional: TierDefaults,
    pub enterprise: TierDefaults,
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self {
            starter: TierDefaults {
                name: "Starter".to_string(),
                description: "Perfect for getting started".to_string(),
                monthly_price: dec!(0.00),
                limits: PlanLimits {
                    max_workloads: 5,
                    max_cpu_per_workload: 1000,
                    max_memory_per_workload: BYTES_PER_GIB,
                    max_scale: 5,
                },
                includes_support: false,
                includes_analytics: false,
                includes_sla: false,
            },
            professional: TierDefaults {
                name: "Professional".to_string(),
                description: "For growing businesses".to_string(),
                monthly_price: dec!(29.99),
                limits: PlanLimits {
                    max_workloads: 20,
                    max_cpu_per_workload: 2000,
                    max_memory_per_workload: 2 * BYTES_PER_GIB,
                    max_scale: 10,
                },
                includes_support: true,
                includes_analytics: false,
                includes_sla: false,
            },
            enterprise: TierDefaults {
                name: "Enterprise".to_string(),
                description: "For large scale applications".to_string(),
                monthly_price: dec!(99.99),
                limits: PlanLimits {
                    max_workloads: 100,
                    max_cpu_per_workload: 4000,
                    max_memory_per_workload: 4 * BYTES_PER_GIB,
                    max_scale: 20,
                },
                includes_support: true,
                includes_analytics: true,
                includes_sla: true,
            },
        }
    }
}

impl TierCatalog {
    pub fn get(&self, tier: PlanTier) -> &TierDefaults {
        match tier {
            PlanTier::Starter => &self.starter,
            PlanTier::Professional => &self.professional,
            PlanTier::Enterprise => &self.enterprise,
        }
    }
}

/// Values used to fill in metrics for workloads without telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadDefaults {
    pub cpu_millicores_per_pod: u64,
    pub memory_bytes_per_pod: u64,
    pub efficiency_percent: Decimal,
    pub cold_start_count: u64,
}

impl Default for WorkloadDefaults {
    fn default() -> Self {
        Self {
            cpu_millicores_per_pod: MILLICORES_PER_CORE,
            memory_bytes_per_pod: DEFAULT_MEMORY_PER_POD,
            efficiency_percent: dec!(80),
            cold_start_count: 0,
        }
    }
}

/// Inputs assumed by pre-deployment estimates when the caller omits them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationDefaults {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
    pub cold_starts: u64,
    pub efficiency_percent: Decimal,
    pub period: BillingPeriod,
}

impl Default for EstimationDefaults {
    fn default() -> Self {
        Self {
            cpu_millicores: MILLICORES_PER_CORE,
            memory_bytes: DEFAULT_MEMORY_PER_POD,
            cold_starts: 0,
            efficiency_percent: dec!(80),
            period: BillingPeriod::Month,
        }
    }
}

/// How the limit checker accounts for a tenant's existing footprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageMode {
    /// min_scale × fixed per-replica constants
    #[default]
    Nominal,
    /// Last captured request totals, nominal where none were captured
    Measured,
}

/// Per-replica footprint assumed in nominal usage accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NominalFootprint {
    pub cpu_millicores_per_replica: u64,
    pub memory_bytes_per_replica: u64,
}

impl Default for NominalFootprint {
    fn default() -> Self {
        Self {
            cpu_millicores_per_replica: MILLICORES_PER_CORE,
            memory_bytes_per_replica: DEFAULT_MEMORY_PER_POD,
        }
    }
}

/// Billing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub rates: FallbackRates,
    pub cluster_load: ClusterLoadBounds,
    pub hours_per_month: Decimal,
    pub periods: PeriodHours,
    /// Quotas used when no plan resolves, or a plan lacks a quota
    pub fallback_limits: PlanLimits,
    pub tiers: TierCatalog,
    pub workload_defaults: WorkloadDefaults,
    pub estimation: EstimationDefaults,
    pub usage_mode: UsageMode,
    pub nominal_footprint: NominalFootprint,
    pub cache_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub subscription_term_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rates: FallbackRates::default(),
            cluster_load: ClusterLoadBounds::default(),
            hours_per_month: dec!(730),
            periods: PeriodHours::default(),
            fallback_limits: PlanLimits::default(),
            tiers: TierCatalog::default(),
            workload_defaults: WorkloadDefaults::default(),
            estimation: EstimationDefaults::default(),
            usage_mode: UsageMode::default(),
            nominal_footprint: NominalFootprint::default(),
            cache_ttl_secs: 120,
            store_timeout_ms: 2000,
            subscription_term_days: 30,
        }
    }
}

impl BillingConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Reject configurations that would break pricing invariants
    pub fn validate(&self) -> crate::Result<()> {
        use crate::BillingError;

        if self.rates.min_efficiency_factor > self.rates.max_efficiency_factor {
            return Err(BillingError::Config(format!(
                "min_efficiency_factor {} exceeds max_efficiency_factor {}",
                self.rates.min_efficiency_factor, self.rates.max_efficiency_factor
            )));
        }
        if self.rates.platform_fee_rate < Decimal::ONE {
            return Err(BillingError::Config(format!(
                "platform_fee_rate {} must be at least 1.0",
                self.rates.platform_fee_rate
            )));
        }
        if self.cluster_load.min_factor > self.cluster_load.max_factor {
            return Err(BillingError::Config(
                "cluster load min_factor exceeds max_factor".to_string(),
            ));
        }
        if self.hours_per_month <= Decimal::ZERO {
            return Err(BillingError::Config(
                "hours_per_month must be positive".to_string(),
            ));
        }
        let tiers = [PlanTier::Starter, PlanTier::Professional, PlanTier::Enterprise];
        for pair in tiers.windows(2) {
            let lower = &self.tiers.get(pair[0]).limits;
            let upper = &self.tiers.get(pair[1]).limits;
            if !lower.is_within(upper) {
                return Err(BillingError::Config(format!(
                    "{} quotas must not exceed {} quotas",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BillingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.hours_per_month, dec!(730));
        assert_eq!(config.periods.hours(BillingPeriod::Month), dec!(720));
    }

    #[test]
    fn test_inverted_efficiency_bounds_rejected() {
        let mut config = BillingConfig::default();
        config.rates.min_efficiency_factor = dec!(1.5);
        assert!(matches!(config.validate(), Err(crate::BillingError::Config(_))));
    }

    #[test]
    fn test_non_monotonic_tiers_rejected() {
        let mut config = BillingConfig::default();
        config.tiers.starter.limits.max_workloads = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config: BillingConfig = serde_json::from_str(
            r#"{"rates": {"cpu_rate_per_hour": "0.004"}, "cache_ttl_secs": 30}"#,
        )
        .unwrap();

        assert_eq!(config.rates.cpu_rate_per_hour, dec!(0.004));
        assert_eq!(config.rates.memory_rate_per_gb_hour, dec!(0.001));
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.tiers.enterprise.limits.max_scale, 20);
    }
}
