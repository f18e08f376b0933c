//! FaaS billing CLI
//!
//! Runs cost estimates, efficiency scoring, plan limit checks and plan
//! listings locally against the billing library.

mod commands;
mod config;
mod output;
mod quantity;

use anyhow::{Context, Result};
use billing_lib::{
    BillingPeriod, Collaborators, EstimateRequest, InMemoryWorkloadStore, PlanTier, RawMetrics,
    ResourceMetricsSnapshot, Workload, WorkloadSpec,
};
use clap::{Parser, Subcommand};
use commands::{efficiency, estimate, limits, plans, CLI_TENANT};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// FaaS billing CLI
#[derive(Parser)]
#[command(name = "fbill")]
#[command(author, version, about = "CLI for the FaaS billing engine", long_about = None)]
pub struct Cli {
    /// JSON config file (defaults to ~/.config/fbill/config.json)
    #[arg(long, env = "FBILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tariff plans
    Plans {
        /// Include inactive plans
        #[arg(long)]
        all: bool,
    },

    /// Estimate the cost of a workload before deploying it
    Estimate {
        /// CPU request, e.g. 500m or 2
        #[arg(long, value_parser = quantity::parse_cpu)]
        cpu: Option<u64>,

        /// Memory request, e.g. 512Mi or 1Gi
        #[arg(long, value_parser = quantity::parse_memory)]
        memory: Option<u64>,

        /// Expected cold starts over the period
        #[arg(long)]
        cold_starts: Option<u64>,

        /// Expected efficiency percentage
        #[arg(long)]
        efficiency: Option<Decimal>,

        /// Billing period (minute, hour, day, month)
        #[arg(long)]
        period: Option<BillingPeriod>,

        /// Price under this plan tier instead of the entry tier
        #[arg(long, value_parser = parse_tier)]
        plan: Option<PlanTier>,
    },

    /// Score resource efficiency from observed usage
    Efficiency {
        /// CPU used, e.g. 250m
        #[arg(long, value_parser = quantity::parse_cpu, default_value = "0")]
        cpu_usage: u64,

        /// CPU requested
        #[arg(long, value_parser = quantity::parse_cpu)]
        cpu_request: u64,

        /// Memory used, e.g. 300Mi
        #[arg(long, value_parser = quantity::parse_memory, default_value = "0")]
        memory_usage: u64,

        /// Memory requested
        #[arg(long, value_parser = quantity::parse_memory)]
        memory_request: u64,

        /// Running pods
        #[arg(long, default_value_t = 1)]
        pods: u32,

        /// Summed pod uptime in seconds
        #[arg(long, default_value = "0")]
        uptime: Decimal,

        /// Slowest cold start in seconds
        #[arg(long, default_value = "0")]
        max_cold_start: Decimal,
    },

    /// Check a proposed workload against plan quotas
    Limits {
        /// CPU request per workload
        #[arg(long, value_parser = quantity::parse_cpu)]
        cpu: u64,

        /// Memory request per workload
        #[arg(long, value_parser = quantity::parse_memory)]
        memory: Option<u64>,

        #[arg(long, default_value_t = 0)]
        min_scale: u32,

        #[arg(long, default_value_t = 1)]
        max_scale: u32,

        /// Workloads the tenant already runs
        #[arg(long, default_value_t = 0)]
        existing: u32,

        /// Check against this plan tier instead of the entry tier
        #[arg(long, value_parser = parse_tier)]
        plan: Option<PlanTier>,
    },
}

fn parse_tier(input: &str) -> Result<PlanTier, String> {
    input.parse().map_err(|e: billing_lib::BillingError| e.to_string())
}

fn placeholder_workloads(count: u32) -> Vec<Workload> {
    (0..count)
        .map(|i| Workload {
            id: format!("existing-{i}"),
            name: format!("existing-{i}"),
            tenant_id: CLI_TENANT.to_string(),
            min_scale: 1,
            max_scale: 1,
            memory_request: None,
            metrics: RawMetrics::default(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::Config::load(cli.config.as_deref())?;
    let default_plan = config
        .default_plan
        .as_deref()
        .map(parse_tier)
        .transpose()
        .map_err(anyhow::Error::msg)
        .context("Invalid default_plan in config")?;
    let billing = config.billing;

    match cli.command {
        Commands::Plans { all } => {
            let (engine, _) = commands::offline_engine(billing, None, None).await?;
            plans::list_plans(&engine, all, cli.format).await?;
        }
        Commands::Estimate {
            cpu,
            memory,
            cold_starts,
            efficiency,
            period,
            plan,
        } => {
            let (engine, tenant) =
                commands::offline_engine(billing, None, plan.or(default_plan)).await?;
            let request = EstimateRequest {
                cpu_request: cpu,
                memory_request: memory,
                expected_cold_starts: cold_starts,
                expected_efficiency: efficiency,
                period,
            };
            estimate::estimate(&engine, tenant, request, cli.format).await?;
        }
        Commands::Efficiency {
            cpu_usage,
            cpu_request,
            memory_usage,
            memory_request,
            pods,
            uptime,
            max_cold_start,
        } => {
            let (engine, _) = commands::offline_engine(billing, None, None).await?;
            let snapshot = ResourceMetricsSnapshot {
                total_cpu_usage: Decimal::from(cpu_usage),
                total_cpu_request: Decimal::from(cpu_request),
                total_memory_usage: memory_usage,
                total_memory_request: memory_request,
                pod_count: pods,
                total_pod_uptime_seconds: uptime,
                max_cold_start_time_seconds: max_cold_start,
                has_usage_samples: true,
                ..Default::default()
            };
            efficiency::show_efficiency(&engine, &snapshot, cli.format)?;
        }
        Commands::Limits {
            cpu,
            memory,
            min_scale,
            max_scale,
            existing,
            plan,
        } => {
            let mut collaborators = Collaborators::in_memory(&billing);
            collaborators.workloads =
                Arc::new(InMemoryWorkloadStore::with_workloads(placeholder_workloads(existing)));
            let (engine, _) =
                commands::offline_engine(billing, Some(collaborators), plan.or(default_plan))
                    .await?;
            let spec = WorkloadSpec {
                cpu_request: cpu,
                memory_request: memory,
                min_scale,
                max_scale,
            };
            if !limits::check_limits(&engine, Some(CLI_TENANT), &spec, cli.format).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
