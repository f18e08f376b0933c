//! Efficiency scoring of observed usage

use anyhow::Result;
use billing_lib::{pricing::efficiency_factor, BillingEngine, EfficiencyResult, ResourceMetricsSnapshot};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::output::{color_efficiency, format_percent, print_json, OutputFormat};

#[derive(Serialize)]
struct EfficiencyOutput {
    #[serde(flatten)]
    result: EfficiencyResult,
    /// Factor the entry tier would apply
    efficiency_factor: Decimal,
}

/// Score a snapshot and show the pricing factor it earns
pub fn show_efficiency(engine: &BillingEngine, snapshot: &ResourceMetricsSnapshot, format: OutputFormat) -> Result<()> {
    snapshot.validate()?;
    let result = engine.efficiency(snapshot);
    let rates = &engine.config().rates;
    let factor = efficiency_factor(
        result.overall_efficiency,
        rates.min_efficiency_factor,
        rates.max_efficiency_factor,
    );

    match format {
        OutputFormat::Json => print_json(&EfficiencyOutput {
            result,
            efficiency_factor: factor,
        })?,
        OutputFormat::Table => {
            println!("{}", "Efficiency".bold());
            println!("{}", "=".repeat(40));
            println!("CPU:                {}", color_efficiency(result.cpu_efficiency));
            println!("Memory:             {}", color_efficiency(result.memory_efficiency));
            println!("Overall:            {}", color_efficiency(result.overall_efficiency));
            println!();
            println!("Potential saving:   {}", format_percent(result.cost_saving_percent));
            println!("Performance score:  {}", result.performance_score);
            println!("Price factor:       x{}", factor);
        }
    }

    Ok(())
}
