//! Subcommand implementations

pub mod efficiency;
pub mod estimate;
pub mod limits;
pub mod plans;

use anyhow::{Context, Result};
use billing_lib::{
    BillingConfig, BillingEngine, Collaborators, PlanTier, StructuredLogger, TariffStore,
    TenantSubscription,
};
use chrono::Utc;
use std::sync::Arc;

/// Tenant id the offline engine bills `--plan` estimates to
pub const CLI_TENANT: &str = "fbill";

/// Offline engine over the configured tier catalog.
///
/// With a `plan`, the CLI tenant is subscribed to that tier's plan.
pub async fn offline_engine(
    config: BillingConfig,
    collaborators: Option<Collaborators>,
    plan: Option<PlanTier>,
) -> Result<(BillingEngine, Option<&'static str>)> {
    let collaborators = collaborators.unwrap_or_else(|| Collaborators::in_memory(&config));
    let tenant = match plan {
        Some(tier) => {
            subscribe(collaborators.tariffs.as_ref(), tier, config.subscription_term_days).await?;
            Some(CLI_TENANT)
        }
        None => None,
    };

    let engine = BillingEngine::new(Arc::new(config), collaborators, StructuredLogger::new("fbill"))
        .context("Invalid billing configuration")?;
    Ok((engine, tenant))
}

async fn subscribe(tariffs: &dyn TariffStore, tier: PlanTier, term_days: i64) -> Result<()> {
    let plan = tariffs
        .active_plan_for_tier(tier)
        .await?
        .with_context(|| format!("No active {tier} plan configured"))?;
    tariffs
        .upsert_subscription(TenantSubscription::start(CLI_TENANT, plan.id, Utc::now(), term_days))
        .await
}
