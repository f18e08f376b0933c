//! Plan catalog listing

use anyhow::Result;
use billing_lib::{BillingEngine, PlanLimits, TariffPlan};
use tabled::Tabled;

use crate::output::{format_bytes, format_cpu, format_currency, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Monthly")]
    monthly: String,
    #[tabled(rename = "CPU $/core-h")]
    cpu_rate: String,
    #[tabled(rename = "Memory $/GiB-h")]
    memory_rate: String,
    #[tabled(rename = "Workloads")]
    max_workloads: u32,
    #[tabled(rename = "CPU/workload")]
    max_cpu: String,
    #[tabled(rename = "Memory/workload")]
    max_memory: String,
    #[tabled(rename = "Scale")]
    max_scale: u32,
}

fn rate(value: Option<rust_decimal::Decimal>) -> String {
    value.map(format_currency).unwrap_or_else(|| "default".to_string())
}

impl PlanRow {
    fn new(plan: &TariffPlan, fallback: &PlanLimits) -> Self {
        let limits = PlanLimits::resolve(Some(plan), fallback);
        Self {
            tier: plan.tier.to_string(),
            name: plan.name.clone(),
            monthly: format_currency(plan.monthly_price),
            cpu_rate: rate(plan.cpu_rate_per_hour),
            memory_rate: rate(plan.memory_rate_per_gb_hour),
            max_workloads: limits.max_workloads,
            max_cpu: format_cpu(limits.max_cpu_per_workload),
            max_memory: format_bytes(limits.max_memory_per_workload),
            max_scale: limits.max_scale,
        }
    }
}

/// List every configured plan, cheapest tier first
pub async fn list_plans(engine: &BillingEngine, include_inactive: bool, format: OutputFormat) -> Result<()> {
    let plans: Vec<TariffPlan> = engine
        .plans()
        .await?
        .into_iter()
        .filter(|p| include_inactive || p.is_active)
        .collect();

    match format {
        OutputFormat::Json => print_json(&plans)?,
        OutputFormat::Table => {
            let fallback = &engine.config().fallback_limits;
            let rows: Vec<PlanRow> = plans.iter().map(|p| PlanRow::new(p, fallback)).collect();
            print_table(rows, "No plans configured");
        }
    }

    Ok(())
}
