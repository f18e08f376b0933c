//! Tariff plans, tenant subscriptions and plan resolution
//!
//! This module provides:
//! - The `TariffPlan` rate card and its quota limits
//! - Tenant subscriptions and their lifecycle helpers
//! - The `TariffStore` collaborator trait with an in-memory implementation
//! - The resolver that picks the plan governing a tenant's billing

mod resolver;
mod store;
mod subscription;

pub use resolver::{TariffResolution, TariffResolver};
pub use store::InMemoryTariffStore;
pub use subscription::{sweep_expired, SweepReport, UsagePercentage};

use crate::config::{FallbackRates, TierDefaults, BYTES_PER_GIB};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical plan tiers, ordered from entry to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    Starter,
    Professional,
    Enterprise,
}

impl PlanTier {
    /// The tier anonymous and unsubscribed tenants are billed on
    pub const ENTRY: PlanTier = PlanTier::Starter;

    pub const ALL: [PlanTier; 3] = [PlanTier::Starter, PlanTier::Professional, PlanTier::Enterprise];

    /// Only a strictly higher tier counts as an upgrade
    pub fn can_upgrade_to(&self, target: PlanTier) -> bool {
        target > *self
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanTier::Starter => f.write_str("STARTER"),
            PlanTier::Professional => f.write_str("PROFESSIONAL"),
            PlanTier::Enterprise => f.write_str("ENTERPRISE"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = crate::BillingError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STARTER" => Ok(PlanTier::Starter),
            "PROFESSIONAL" => Ok(PlanTier::Professional),
            "ENTERPRISE" => Ok(PlanTier::Enterprise),
            other => Err(crate::BillingError::invalid(
                "tier",
                format!("unknown plan tier '{other}'"),
            )),
        }
    }
}

/// Quota limits of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_workloads: u32,
    /// Millicores
    pub max_cpu_per_workload: u64,
    /// Bytes
    pub max_memory_per_workload: u64,
    pub max_scale: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_workloads: 10,
            max_cpu_per_workload: 2000,
            max_memory_per_workload: 2 * BYTES_PER_GIB,
            max_scale: 10,
        }
    }
}

impl PlanLimits {
    /// Resolve a plan's quotas field by field; without a plan, `fallback` wholesale
    pub fn resolve(plan: Option<&TariffPlan>, fallback: &PlanLimits) -> PlanLimits {
        match plan {
            None => fallback.clone(),
            Some(plan) => PlanLimits {
                max_workloads: plan.max_workloads.unwrap_or(fallback.max_workloads),
                max_cpu_per_workload: plan
                    .max_cpu_per_workload
                    .unwrap_or(fallback.max_cpu_per_workload),
                max_memory_per_workload: plan
                    .max_memory_per_workload
                    .unwrap_or(fallback.max_memory_per_workload),
                max_scale: plan.max_scale.unwrap_or(fallback.max_scale),
            },
        }
    }

    /// True when every quota is at most the corresponding quota of `other`
    pub fn is_within(&self, other: &PlanLimits) -> bool {
        self.max_workloads <= other.max_workloads
            && self.max_cpu_per_workload <= other.max_cpu_per_workload
            && self.max_memory_per_workload <= other.max_memory_per_workload
            && self.max_scale <= other.max_scale
    }
}

/// A named rate card plus quota limits.
///
/// Rate and quota fields are optional; an absent field resolves to the
/// configured fallback (see `RateCard::resolve` and `PlanLimits::resolve`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffPlan {
    pub id: String,
    pub name: String,
    pub tier: PlanTier,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// $ per core-hour
    #[serde(default)]
    pub cpu_rate_per_hour: Option<Decimal>,
    /// $ per GiB-hour
    #[serde(default)]
    pub memory_rate_per_gb_hour: Option<Decimal>,
    /// $ per cold start
    #[serde(default)]
    pub cold_start_penalty: Option<Decimal>,
    /// Multiplier applied on top of the base cost, at least 1.0
    #[serde(default)]
    pub platform_fee_rate: Option<Decimal>,
    /// Lower bound of the efficiency factor (best-efficiency discount)
    #[serde(default)]
    pub min_efficiency_factor: Option<Decimal>,
    /// Upper bound of the efficiency factor (worst-efficiency surcharge)
    #[serde(default)]
    pub max_efficiency_factor: Option<Decimal>,

    #[serde(default)]
    pub max_workloads: Option<u32>,
    #[serde(default)]
    pub max_cpu_per_workload: Option<u64>,
    #[serde(default)]
    pub max_memory_per_workload: Option<u64>,
    #[serde(default)]
    pub max_scale: Option<u32>,

    #[serde(default)]
    pub includes_support: bool,
    #[serde(default)]
    pub includes_analytics: bool,
    #[serde(default)]
    pub includes_sla: bool,

    /// Flat subscription price, $ per month
    #[serde(default)]
    pub monthly_price: Decimal,
}

fn default_true() -> bool {
    true
}

impl TariffPlan {
    /// A plan provisioned from a tier catalog entry with the configured rates
    pub fn from_tier(tier: PlanTier, defaults: &TierDefaults, rates: &FallbackRates) -> Self {
        Self {
            id: tier.to_string().to_ascii_lowercase(),
            name: defaults.name.clone(),
            tier,
            description: defaults.description.clone(),
            is_active: true,
            cpu_rate_per_hour: Some(rates.cpu_rate_per_hour),
            memory_rate_per_gb_hour: Some(rates.memory_rate_per_gb_hour),
            cold_start_penalty: Some(rates.cold_start_penalty),
            platform_fee_rate: Some(rates.platform_fee_rate),
            min_efficiency_factor: Some(rates.min_efficiency_factor),
            max_efficiency_factor: Some(rates.max_efficiency_factor),
            max_workloads: Some(defaults.limits.max_workloads),
            max_cpu_per_workload: Some(defaults.limits.max_cpu_per_workload),
            max_memory_per_workload: Some(defaults.limits.max_memory_per_workload),
            max_scale: Some(defaults.limits.max_scale),
            includes_support: defaults.includes_support,
            includes_analytics: defaults.includes_analytics,
            includes_sla: defaults.includes_sla,
            monthly_price: defaults.monthly_price,
        }
    }

    /// Zero-price entry plan created when no entry plan has been provisioned
    pub fn bootstrap_entry(rates: &FallbackRates, limits: &PlanLimits) -> Self {
        Self {
            id: "starter".to_string(),
            name: "Starter Plan".to_string(),
            tier: PlanTier::ENTRY,
            description: "Default starter plan".to_string(),
            is_active: true,
            cpu_rate_per_hour: Some(rates.cpu_rate_per_hour),
            memory_rate_per_gb_hour: Some(rates.memory_rate_per_gb_hour),
            cold_start_penalty: Some(rates.cold_start_penalty),
            platform_fee_rate: Some(rates.platform_fee_rate),
            min_efficiency_factor: Some(rates.min_efficiency_factor),
            max_efficiency_factor: Some(rates.max_efficiency_factor),
            max_workloads: Some(limits.max_workloads),
            max_cpu_per_workload: Some(limits.max_cpu_per_workload),
            max_memory_per_workload: Some(limits.max_memory_per_workload),
            max_scale: Some(limits.max_scale),
            includes_support: false,
            includes_analytics: false,
            includes_sla: false,
            monthly_price: Decimal::ZERO,
        }
    }

    /// Reject rates no computation could run with. Unset fields are not
    /// checked; they resolve to the validated fallbacks.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::BillingError;

        if let (Some(min), Some(max)) = (self.min_efficiency_factor, self.max_efficiency_factor) {
            if min > max {
                return Err(BillingError::Config(format!(
                    "plan '{}': min_efficiency_factor {min} exceeds max_efficiency_factor {max}",
                    self.id
                )));
            }
        }
        if let Some(fee) = self.platform_fee_rate {
            if fee < Decimal::ONE {
                return Err(BillingError::Config(format!(
                    "plan '{}': platform_fee_rate {fee} must be at least 1.0",
                    self.id
                )));
            }
        }
        let rates = [
            ("cpu_rate_per_hour", self.cpu_rate_per_hour),
            ("memory_rate_per_gb_hour", self.memory_rate_per_gb_hour),
            ("cold_start_penalty", self.cold_start_penalty),
            ("monthly_price", Some(self.monthly_price)),
        ];
        for (name, value) in rates {
            if let Some(value) = value.filter(|v| *v < Decimal::ZERO) {
                return Err(BillingError::Config(format!(
                    "plan '{}': {name} {value} is negative",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Subscription status; only `Active` is billable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Cancelled,
    Expired,
}

/// Binds a tenant to exactly one tariff plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSubscription {
    pub tenant_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub auto_renew: bool,

    /// Period-to-date usage counters
    #[serde(default)]
    pub workloads_used: u32,
    /// Millicores
    #[serde(default)]
    pub cpu_used: u64,
    /// Bytes
    #[serde(default)]
    pub memory_used: u64,
}

impl TenantSubscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

/// Storage for plans and subscriptions.
///
/// Lookups return at most one result; absence is `Ok(None)`, not an error.
#[async_trait]
pub trait TariffStore: Send + Sync {
    /// The tenant's subscription if it is active
    async fn active_subscription(&self, tenant_id: &str) -> anyhow::Result<Option<TenantSubscription>>;

    /// The tenant's subscription regardless of status
    async fn subscription(&self, tenant_id: &str) -> anyhow::Result<Option<TenantSubscription>>;

    /// Look up a plan by id
    async fn plan(&self, plan_id: &str) -> anyhow::Result<Option<TariffPlan>>;

    /// The active plan carrying `tier`
    async fn active_plan_for_tier(&self, tier: PlanTier) -> anyhow::Result<Option<TariffPlan>>;

    /// All plans, ordered by tier
    async fn plans(&self) -> anyhow::Result<Vec<TariffPlan>>;

    /// Insert a plan; at most one plan may carry a given tier
    async fn insert_plan(&self, plan: TariffPlan) -> anyhow::Result<TariffPlan>;

    /// Create or replace the tenant's subscription
    async fn upsert_subscription(&self, subscription: TenantSubscription) -> anyhow::Result<()>;

    /// Active subscriptions whose end date is before `now`
    async fn expired_active_subscriptions(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TenantSubscription>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FallbackRates, TierCatalog};
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_ordering() {
        assert!(PlanTier::Starter < PlanTier::Professional);
        assert!(PlanTier::Professional < PlanTier::Enterprise);
        assert!(PlanTier::Starter.can_upgrade_to(PlanTier::Enterprise));
        assert!(!PlanTier::Enterprise.can_upgrade_to(PlanTier::Professional));
        assert!(!PlanTier::Professional.can_upgrade_to(PlanTier::Professional));
    }

    #[test]
    fn test_tier_parse_roundtrip() {
        for tier in PlanTier::ALL {
            assert_eq!(tier.to_string().parse::<PlanTier>().unwrap(), tier);
        }
        assert_eq!("professional".parse::<PlanTier>().unwrap(), PlanTier::Professional);
        assert!("gold".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_limits_resolve_per_field() {
        let mut plan = TariffPlan::from_tier(
            PlanTier::Enterprise,
            &TierCatalog::default().enterprise,
            &FallbackRates::default(),
        );
        plan.max_scale = None;

        let limits = PlanLimits::resolve(Some(&plan), &PlanLimits::default());
        assert_eq!(limits.max_workloads, 100);
        assert_eq!(limits.max_cpu_per_workload, 4000);
        assert_eq!(limits.max_scale, 10);
    }

    #[test]
    fn test_limits_resolve_without_plan() {
        let limits = PlanLimits::resolve(None, &PlanLimits::default());
        assert_eq!(limits, PlanLimits::default());
        assert_eq!(limits.max_memory_per_workload, 2147483648);
    }

    #[test]
    fn test_canonical_quotas_increase_with_tier() {
        let catalog = TierCatalog::default();
        let rates = FallbackRates::default();
        let plans: Vec<PlanLimits> = PlanTier::ALL
            .iter()
            .map(|t| {
                let plan = TariffPlan::from_tier(*t, catalog.get(*t), &rates);
                PlanLimits::resolve(Some(&plan), &PlanLimits::default())
            })
            .collect();

        assert!(plans[0].is_within(&plans[1]));
        assert!(plans[1].is_within(&plans[2]));
    }

    #[test]
    fn test_validate_rejects_crossed_efficiency_bounds() {
        let mut plan = TariffPlan::from_tier(
            PlanTier::Professional,
            &TierCatalog::default().professional,
            &FallbackRates::default(),
        );
        assert!(plan.validate().is_ok());

        plan.min_efficiency_factor = Some(dec!(1.5));
        plan.max_efficiency_factor = Some(dec!(1.2));
        assert!(matches!(plan.validate(), Err(crate::BillingError::Config(_))));

        // a lone bound is checked against the fallback at resolution time
        plan.max_efficiency_factor = None;
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_discounting_fee_and_negative_rates() {
        let mut plan = TariffPlan::from_tier(
            PlanTier::Starter,
            &TierCatalog::default().starter,
            &FallbackRates::default(),
        );
        plan.platform_fee_rate = Some(dec!(0.9));
        assert!(plan.validate().is_err());

        plan.platform_fee_rate = Some(Decimal::ONE);
        plan.cpu_rate_per_hour = Some(dec!(-0.001));
        assert!(plan.validate().is_err());
    }
}
