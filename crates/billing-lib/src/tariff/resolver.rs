//! Tariff resolution with a deterministic fallback chain

use super::{PlanTier, TariffPlan, TariffStore};
use crate::config::BillingConfig;
use crate::error::bounded;
use crate::observability::BillingMetrics;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Which branch of the resolution chain produced the plan
#[derive(Debug, Clone, PartialEq)]
pub enum TariffResolution {
    /// The tenant's active subscription
    Subscription(TariffPlan),
    /// Anonymous caller, or tenant without an active subscription
    EntryTier(TariffPlan),
    /// No entry plan existed; a zero-price one was created
    Bootstrapped(TariffPlan),
    /// The store failed or timed out; callers use hardcoded fallbacks
    Unavailable(String),
}

impl TariffResolution {
    pub fn plan(&self) -> Option<&TariffPlan> {
        match self {
            TariffResolution::Subscription(plan)
            | TariffResolution::EntryTier(plan)
            | TariffResolution::Bootstrapped(plan) => Some(plan),
            TariffResolution::Unavailable(_) => None,
        }
    }

    pub fn into_plan(self) -> Option<TariffPlan> {
        match self {
            TariffResolution::Subscription(plan)
            | TariffResolution::EntryTier(plan)
            | TariffResolution::Bootstrapped(plan) => Some(plan),
            TariffResolution::Unavailable(_) => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, TariffResolution::Unavailable(_))
    }

    /// Short label used in logs and metrics
    pub fn branch(&self) -> &'static str {
        match self {
            TariffResolution::Subscription(_) => "subscription",
            TariffResolution::EntryTier(_) => "entry_tier",
            TariffResolution::Bootstrapped(_) => "bootstrapped",
            TariffResolution::Unavailable(_) => "unavailable",
        }
    }
}

/// Picks the tariff plan that governs a tenant's billing
#[derive(Clone)]
pub struct TariffResolver {
    store: Arc<dyn TariffStore>,
    timeout: Duration,
    bootstrap: TariffPlan,
    metrics: BillingMetrics,
}

impl TariffResolver {
    pub fn new(store: Arc<dyn TariffStore>, config: &BillingConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout(),
            bootstrap: TariffPlan::bootstrap_entry(&config.rates, &config.fallback_limits),
            metrics: BillingMetrics::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TariffStore> {
        &self.store
    }

    /// Resolve the plan for `tenant_id`. Never fails: store errors collapse
    /// into `TariffResolution::Unavailable`.
    pub async fn resolve(&self, tenant_id: Option<&str>) -> TariffResolution {
        match self.try_resolve(tenant_id).await {
            Ok(resolution) => {
                debug!(
                    tenant_id = tenant_id.unwrap_or("-"),
                    branch = resolution.branch(),
                    "Resolved tariff"
                );
                resolution
            }
            Err(e) => {
                warn!(
                    tenant_id = tenant_id.unwrap_or("-"),
                    error = %e,
                    "Tariff store unavailable, using fallback rates"
                );
                self.metrics.inc_tariff_fallbacks("store_unavailable");
                TariffResolution::Unavailable(e.to_string())
            }
        }
    }

    async fn try_resolve(&self, tenant_id: Option<&str>) -> Result<TariffResolution> {
        if let Some(tenant_id) = tenant_id {
            let subscription = bounded(
                "active_subscription",
                self.timeout,
                self.store.active_subscription(tenant_id),
            )
            .await?;

            if let Some(subscription) = subscription {
                let plan = bounded("plan", self.timeout, self.store.plan(&subscription.plan_id)).await?;
                match plan {
                    Some(plan) => return Ok(TariffResolution::Subscription(plan)),
                    None => warn!(
                        tenant_id = %tenant_id,
                        plan_id = %subscription.plan_id,
                        "Subscription references an unknown plan, using entry tier"
                    ),
                }
            }
        }

        let entry = bounded(
            "active_plan_for_tier",
            self.timeout,
            self.store.active_plan_for_tier(PlanTier::ENTRY),
        )
        .await?;

        match entry {
            Some(plan) => Ok(TariffResolution::EntryTier(plan)),
            None => {
                let plan = bounded(
                    "insert_plan",
                    self.timeout,
                    self.store.insert_plan(self.bootstrap.clone()),
                )
                .await?;
                warn!(plan_id = %plan.id, "No entry plan provisioned, bootstrapped a free one");
                Ok(TariffResolution::Bootstrapped(plan))
            }
        }
    }
}
