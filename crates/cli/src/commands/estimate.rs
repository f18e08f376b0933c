//! Pre-deployment cost estimates

use anyhow::Result;
use billing_lib::{BillingEngine, CostBreakdown, EstimateRequest, Outcome};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_currency, print_degradations, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct LineRow {
    #[tabled(rename = "Item")]
    item: &'static str,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

#[derive(Serialize)]
struct EstimateOutput<'a> {
    request: &'a EstimateRequest,
    plan: &'a str,
    breakdown: &'a CostBreakdown,
    degraded: bool,
}

fn line_items(b: &CostBreakdown) -> Vec<LineRow> {
    vec![
        LineRow {
            item: "CPU",
            quantity: format!("{:.4} core-h", b.cpu_hours),
            cost: format_currency(b.cpu_cost),
        },
        LineRow {
            item: "Memory",
            quantity: format!("{:.4} GiB-h", b.memory_gb_hours),
            cost: format_currency(b.memory_cost),
        },
        LineRow {
            item: "Cold starts",
            quantity: b.cold_start_count.to_string(),
            cost: format_currency(b.cold_start_cost),
        },
        LineRow {
            item: "Efficiency factor",
            quantity: format!("x{} at {}%", b.efficiency_factor, b.average_efficiency),
            cost: format_currency(b.base_cost),
        },
        LineRow {
            item: "Platform fee",
            quantity: String::new(),
            cost: format_currency(b.platform_fee),
        },
        LineRow {
            item: "Plan share",
            quantity: String::new(),
            cost: format_currency(b.fixed_plan_cost),
        },
    ]
}

/// Estimate and print the cost of a proposed workload
pub async fn estimate(
    engine: &BillingEngine,
    tenant: Option<&str>,
    request: EstimateRequest,
    format: OutputFormat,
) -> Result<()> {
    let outcome = engine.estimate(tenant, &request).await?;
    let plan = engine
        .resolve_tariff(tenant)
        .await
        .plan()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "fallback rates".to_string());

    let breakdown = match &outcome {
        Outcome::Complete(b) | Outcome::Degraded { value: b, .. } => b,
        Outcome::Failed(reason) => anyhow::bail!("estimate failed: {reason}"),
    };

    match format {
        OutputFormat::Json => print_json(&EstimateOutput {
            request: &request,
            plan: &plan,
            breakdown,
            degraded: outcome.is_degraded(),
        })?,
        OutputFormat::Table => {
            let period = request
                .period
                .unwrap_or(engine.config().estimation.period);
            println!("{} ({}, per {})", "Cost Estimate".bold(), plan.cyan(), period);
            print_table(line_items(breakdown), "");
            println!(
                "{} {}",
                "Total:".bold(),
                format_currency(breakdown.total_cost).green().bold()
            );
            print_degradations(outcome.reasons());
        }
    }

    Ok(())
}
