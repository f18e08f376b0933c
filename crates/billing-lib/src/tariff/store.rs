//! In-memory tariff store

use super::{PlanTier, SubscriptionStatus, TariffPlan, TariffStore, TenantSubscription};
use crate::config::{FallbackRates, TierCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Plans and subscriptions held in process memory
#[derive(Default)]
pub struct InMemoryTariffStore {
    plans: RwLock<HashMap<String, TariffPlan>>,
    subscriptions: RwLock<HashMap<String, TenantSubscription>>,
}

impl InMemoryTariffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store provisioned with the three canonical tiers
    pub fn with_catalog(catalog: &TierCatalog, rates: &FallbackRates) -> Self {
        let plans = PlanTier::ALL
            .iter()
            .map(|tier| {
                let plan = TariffPlan::from_tier(*tier, catalog.get(*tier), rates);
                (plan.id.clone(), plan)
            })
            .collect();

        Self {
            plans: RwLock::new(plans),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// A store seeded with explicit plans and subscriptions
    pub fn seeded(plans: Vec<TariffPlan>, subscriptions: Vec<TenantSubscription>) -> Self {
        Self {
            plans: RwLock::new(plans.into_iter().map(|p| (p.id.clone(), p)).collect()),
            subscriptions: RwLock::new(
                subscriptions
                    .into_iter()
                    .map(|s| (s.tenant_id.clone(), s))
                    .collect(),
            ),
        }
    }

    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }
}

#[async_trait]
impl TariffStore for InMemoryTariffStore {
    async fn active_subscription(&self, tenant_id: &str) -> anyhow::Result<Option<TenantSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .get(tenant_id)
            .filter(|s| s.is_active())
            .cloned())
    }

    async fn subscription(&self, tenant_id: &str) -> anyhow::Result<Option<TenantSubscription>> {
        Ok(self.subscriptions.read().await.get(tenant_id).cloned())
    }

    async fn plan(&self, plan_id: &str) -> anyhow::Result<Option<TariffPlan>> {
        Ok(self.plans.read().await.get(plan_id).cloned())
    }

    async fn active_plan_for_tier(&self, tier: PlanTier) -> anyhow::Result<Option<TariffPlan>> {
        let plans = self.plans.read().await;
        Ok(plans
            .values()
            .find(|p| p.tier == tier && p.is_active)
            .cloned())
    }

    async fn plans(&self) -> anyhow::Result<Vec<TariffPlan>> {
        let mut plans: Vec<TariffPlan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.id.cmp(&b.id)));
        Ok(plans)
    }

    async fn insert_plan(&self, plan: TariffPlan) -> anyhow::Result<TariffPlan> {
        plan.validate()?;
        let mut plans = self.plans.write().await;
        if let Some(existing) = plans.values().find(|p| p.tier == plan.tier && p.id != plan.id) {
            anyhow::bail!(
                "tier {} is already carried by plan '{}'",
                plan.tier,
                existing.id
            );
        }
        plans.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    async fn upsert_subscription(&self, subscription: TenantSubscription) -> anyhow::Result<()> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.tenant_id.clone(), subscription);
        Ok(())
    }

    async fn expired_active_subscriptions(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TenantSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .values()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .filter(|s| s.end_date.map(|end| end < now).unwrap_or(false))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(tenant: &str, plan: &str, status: SubscriptionStatus) -> TenantSubscription {
        TenantSubscription {
            tenant_id: tenant.to_string(),
            plan_id: plan.to_string(),
            status,
            start_date: Utc::now(),
            end_date: None,
            auto_renew: true,
            workloads_used: 0,
            cpu_used: 0,
            memory_used: 0,
        }
    }

    #[tokio::test]
    async fn test_catalog_store_has_all_tiers() {
        let store = InMemoryTariffStore::with_catalog(&TierCatalog::default(), &FallbackRates::default());
        let plans = store.plans().await.unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].tier, PlanTier::Starter);
        assert_eq!(plans[2].tier, PlanTier::Enterprise);
        assert!(store
            .active_plan_for_tier(PlanTier::Professional)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_inactive_subscription_not_returned() {
        let store = InMemoryTariffStore::seeded(
            vec![],
            vec![subscription("t1", "starter", SubscriptionStatus::Suspended)],
        );

        assert!(store.active_subscription("t1").await.unwrap().is_none());
        assert!(store.subscription("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_tier_rejected() {
        let store = InMemoryTariffStore::with_catalog(&TierCatalog::default(), &FallbackRates::default());
        let mut duplicate =
            TariffPlan::bootstrap_entry(&FallbackRates::default(), &Default::default());
        duplicate.id = "starter-2".to_string();

        assert!(store.insert_plan(duplicate).await.is_err());
        assert_eq!(store.plan_count().await, 3);
    }

    #[tokio::test]
    async fn test_plan_with_crossed_bounds_rejected() {
        let store = InMemoryTariffStore::new();
        let mut plan = TariffPlan::bootstrap_entry(&FallbackRates::default(), &Default::default());
        plan.min_efficiency_factor = Some(rust_decimal_macros::dec!(1.5));
        plan.max_efficiency_factor = Some(rust_decimal_macros::dec!(1.1));

        let err = store.insert_plan(plan).await.unwrap_err();
        assert!(err.to_string().contains("min_efficiency_factor"));
        assert_eq!(store.plan_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_active_subscriptions() {
        let now = Utc::now();
        let mut past = subscription("t1", "starter", SubscriptionStatus::Active);
        past.end_date = Some(now - Duration::days(1));
        let mut future = subscription("t2", "starter", SubscriptionStatus::Active);
        future.end_date = Some(now + Duration::days(1));
        let mut cancelled = subscription("t3", "starter", SubscriptionStatus::Cancelled);
        cancelled.end_date = Some(now - Duration::days(1));

        let store = InMemoryTariffStore::seeded(vec![], vec![past, future, cancelled]);
        let expired = store.expired_active_subscriptions(now).await.unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].tenant_id, "t1");
    }
}
