//! Plan quota checks for a proposed workload

use anyhow::Result;
use billing_lib::{BillingEngine, LimitCheck, Outcome, WorkloadSpec};
use colored::Colorize;
use tabled::Tabled;

use crate::output::{
    color_check, format_bytes, format_cpu, print_degradations, print_error, print_json,
    print_success, print_table, OutputFormat,
};

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Quota")]
    quota: &'static str,
    #[tabled(rename = "Requested")]
    requested: String,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn rows(spec: &WorkloadSpec, check: &LimitCheck) -> Vec<CheckRow> {
    vec![
        CheckRow {
            quota: "Workloads",
            requested: format!("{} + 1", check.current_usage.workloads_count),
            limit: check.limits.max_workloads.to_string(),
            status: color_check(check.checks.workloads_limit),
        },
        CheckRow {
            quota: "CPU",
            requested: format_cpu(spec.cpu_request),
            limit: format_cpu(check.limits.max_cpu_per_workload),
            status: color_check(check.checks.cpu_limit),
        },
        CheckRow {
            quota: "Memory",
            requested: format_bytes(spec.memory_request.unwrap_or(0)),
            limit: format_bytes(check.limits.max_memory_per_workload),
            status: color_check(check.checks.memory_limit),
        },
        CheckRow {
            quota: "Max scale",
            requested: spec.max_scale.to_string(),
            limit: check.limits.max_scale.to_string(),
            status: color_check(check.checks.scale_limit),
        },
    ]
}

/// Check `spec` against the plan quotas; returns whether it is allowed
pub async fn check_limits(
    engine: &BillingEngine,
    tenant: Option<&str>,
    spec: &WorkloadSpec,
    format: OutputFormat,
) -> Result<bool> {
    let outcome = engine.check_limits(spec, tenant).await;
    let check = match &outcome {
        Outcome::Complete(c) | Outcome::Degraded { value: c, .. } => c,
        Outcome::Failed(reason) => anyhow::bail!("limit check failed: {reason}"),
    };

    match format {
        OutputFormat::Json => print_json(check)?,
        OutputFormat::Table => {
            println!("{}", "Plan Limits".bold());
            print_table(rows(spec, check), "");
            if check.allowed {
                print_success("Workload fits the plan");
            } else {
                print_error(&format!(
                    "Workload exceeds the plan: {}",
                    check.checks.failed().join(", ")
                ));
            }
            print_degradations(outcome.reasons());
        }
    }

    Ok(check.allowed)
}
