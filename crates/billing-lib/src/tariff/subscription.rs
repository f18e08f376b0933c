//! Subscription lifecycle helpers

use super::{SubscriptionStatus, TariffPlan, TariffStore, TenantSubscription};
use crate::error::bounded;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

/// Period-to-date usage as percentages of the plan's quotas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePercentage {
    pub cpu: Decimal,
    pub memory: Decimal,
    pub workloads: Decimal,
}

fn percent_of(used: u64, quota: Option<u64>) -> Decimal {
    match quota {
        Some(quota) if quota > 0 => {
            (Decimal::from(used) / Decimal::from(quota) * dec!(100)).min(dec!(100))
        }
        _ => Decimal::ZERO,
    }
}

impl TenantSubscription {
    /// A fresh active subscription running for `term_days`
    pub fn start(tenant_id: impl Into<String>, plan_id: impl Into<String>, now: DateTime<Utc>, term_days: i64) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            plan_id: plan_id.into(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: Some(now + Duration::days(term_days)),
            auto_renew: true,
            workloads_used: 0,
            cpu_used: 0,
            memory_used: 0,
        }
    }

    /// Usage counters against `plan`'s quotas, each capped at 100; a zero or
    /// unset quota reads as 0
    pub fn usage_percentage(&self, plan: &TariffPlan) -> UsagePercentage {
        UsagePercentage {
            cpu: percent_of(self.cpu_used, plan.max_cpu_per_workload),
            memory: percent_of(self.memory_used, plan.max_memory_per_workload),
            workloads: percent_of(
                u64::from(self.workloads_used),
                plan.max_workloads.map(u64::from),
            ),
        }
    }

    /// Whether moving from `current` to `target` counts as an upgrade
    pub fn can_upgrade(current: &TariffPlan, target: &TariffPlan) -> bool {
        target.is_active && current.tier.can_upgrade_to(target.tier)
    }
}

/// Counts from one expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub renewed: usize,
    pub expired: usize,
}

/// Renew or expire every active subscription whose end date has passed.
///
/// Auto-renewing subscriptions get a new end date `term_days` from `now`;
/// the rest are marked `Expired`.
pub async fn sweep_expired(
    store: &dyn TariffStore,
    now: DateTime<Utc>,
    term_days: i64,
    timeout: StdDuration,
) -> Result<SweepReport> {
    let due = bounded(
        "expired_active_subscriptions",
        timeout,
        store.expired_active_subscriptions(now),
    )
    .await?;

    let mut report = SweepReport::default();
    for mut subscription in due {
        if subscription.auto_renew {
            subscription.end_date = Some(now + Duration::days(term_days));
            report.renewed += 1;
        } else {
            subscription.status = SubscriptionStatus::Expired;
            report.expired += 1;
        }
        bounded(
            "upsert_subscription",
            timeout,
            store.upsert_subscription(subscription),
        )
        .await?;
    }

    Ok(report)
}
