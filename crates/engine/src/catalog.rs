//! Seed data for the in-memory stores

use anyhow::{Context, Result};
use billing_lib::{
    BillingConfig, Collaborators, InMemoryCostCache, InMemoryTariffStore, InMemoryWorkloadStore,
    PlanTier, TariffPlan, TenantSubscription, Workload,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Plans, subscriptions and workloads loaded at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// Empty means the configured tier catalog
    pub plans: Vec<TariffPlan>,
    pub subscriptions: Vec<TenantSubscription>,
    pub workloads: Vec<Workload>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        catalog
            .validate()
            .with_context(|| format!("Invalid catalog {}", path.display()))?;
        Ok(catalog)
    }

    /// Every listed plan must carry usable rates
    pub fn validate(&self) -> Result<()> {
        for plan in &self.plans {
            plan.validate()?;
        }
        Ok(())
    }

    fn plans_or_tiers(plans: Vec<TariffPlan>, config: &BillingConfig) -> Vec<TariffPlan> {
        if !plans.is_empty() {
            return plans;
        }
        PlanTier::ALL
            .iter()
            .map(|tier| TariffPlan::from_tier(*tier, config.tiers.get(*tier), &config.rates))
            .collect()
    }

    /// In-memory collaborators holding this catalog
    pub fn into_collaborators(self, config: &BillingConfig) -> Collaborators {
        let plans = Self::plans_or_tiers(self.plans, config);

        Collaborators {
            tariffs: Arc::new(InMemoryTariffStore::seeded(plans, self.subscriptions)),
            workloads: Arc::new(InMemoryWorkloadStore::with_workloads(self.workloads)),
            cache: Arc::new(InMemoryCostCache::new()),
            metrics_source: None,
        }
    }
}
