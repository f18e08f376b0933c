//! Core data models for the billing engine

use crate::{BillingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics as reported by the orchestration collaborator.
///
/// Any subset of keys may be absent. Quantities arrive already normalized:
/// CPU in millicores, memory in bytes, durations in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cpu_usage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cpu_request: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_memory_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_memory_request: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pod_uptime_seconds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cold_start_time_seconds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cold_start_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_efficiency: Option<Decimal>,
}

impl RawMetrics {
    /// Normalize into a snapshot, treating absent quantities as zero
    pub fn to_snapshot(&self) -> ResourceMetricsSnapshot {
        ResourceMetricsSnapshot {
            total_cpu_usage: self.total_cpu_usage.unwrap_or_default(),
            total_cpu_request: self.total_cpu_request.unwrap_or_default(),
            total_memory_usage: self.total_memory_usage.unwrap_or_default(),
            total_memory_request: self.total_memory_request.unwrap_or_default(),
            pod_count: self.pod_count.unwrap_or_default(),
            total_pod_uptime_seconds: self.total_pod_uptime_seconds.unwrap_or_default(),
            max_cold_start_time_seconds: self.max_cold_start_time_seconds.unwrap_or_default(),
            cold_start_count: self.cold_start_count.unwrap_or_default(),
            overall_efficiency: self.overall_efficiency,
            has_usage_samples: self.total_cpu_usage.is_some()
                || self.total_memory_usage.is_some(),
        }
    }

    /// Whether any field was reported at all
    pub fn is_empty(&self) -> bool {
        *self == RawMetrics::default()
    }
}

/// Per-workload aggregate counters for one reporting window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetricsSnapshot {
    /// CPU actually used, millicores
    pub total_cpu_usage: Decimal,
    /// CPU requested across all pods, millicores
    pub total_cpu_request: Decimal,
    pub total_memory_usage: u64,
    pub total_memory_request: u64,
    pub pod_count: u32,
    pub total_pod_uptime_seconds: Decimal,
    pub max_cold_start_time_seconds: Decimal,
    pub cold_start_count: u64,
    /// Explicit efficiency override (percent); derived from usage when absent
    pub overall_efficiency: Option<Decimal>,
    /// Set when the collaborator reported usage, not just requests
    #[serde(default)]
    pub has_usage_samples: bool,
}

impl ResourceMetricsSnapshot {
    /// Snapshot from request totals only, as used for estimates
    pub fn from_requests(
        cpu_request_millicores: u64,
        memory_request_bytes: u64,
        cold_start_count: u64,
        overall_efficiency: Decimal,
    ) -> Self {
        Self {
            total_cpu_request: Decimal::from(cpu_request_millicores),
            total_memory_request: memory_request_bytes,
            cold_start_count,
            overall_efficiency: Some(overall_efficiency),
            ..Default::default()
        }
    }

    /// Reject negative quantities; unsigned fields cannot be negative
    pub fn validate(&self) -> Result<()> {
        let checks: [(&'static str, Decimal); 4] = [
            ("total_cpu_usage", self.total_cpu_usage),
            ("total_cpu_request", self.total_cpu_request),
            ("total_pod_uptime_seconds", self.total_pod_uptime_seconds),
            ("max_cold_start_time_seconds", self.max_cold_start_time_seconds),
        ];
        for (field, value) in checks {
            if value < Decimal::ZERO {
                return Err(BillingError::invalid(field, format!("{value} is negative")));
            }
        }
        if let Some(efficiency) = self.overall_efficiency {
            if efficiency < Decimal::ZERO {
                return Err(BillingError::invalid(
                    "overall_efficiency",
                    format!("{efficiency} is negative"),
                ));
            }
        }
        Ok(())
    }
}

/// Canonical billing windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Minute,
    Hour,
    Day,
    Month,
}

impl BillingPeriod {
    pub const ALL: [BillingPeriod; 4] = [
        BillingPeriod::Minute,
        BillingPeriod::Hour,
        BillingPeriod::Day,
        BillingPeriod::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Minute => "minute",
            BillingPeriod::Hour => "hour",
            BillingPeriod::Day => "day",
            BillingPeriod::Month => "month",
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillingPeriod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(BillingPeriod::Minute),
            "hour" => Ok(BillingPeriod::Hour),
            "day" => Ok(BillingPeriod::Day),
            "month" => Ok(BillingPeriod::Month),
            other => Err(BillingError::invalid(
                "period",
                format!("unknown billing period '{other}'"),
            )),
        }
    }
}

/// A deployed serverless workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    #[serde(default)]
    pub min_scale: u32,
    #[serde(default = "default_max_scale")]
    pub max_scale: u32,
    /// Memory request per workload in bytes, when configured explicitly
    #[serde(default)]
    pub memory_request: Option<u64>,
    /// Last metrics captured for this workload
    #[serde(default)]
    pub metrics: RawMetrics,
}

fn default_max_scale() -> u32 {
    5
}

impl Workload {
    pub fn spec(&self) -> WorkloadSpec {
        WorkloadSpec {
            cpu_request: 0,
            memory_request: self.memory_request,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
        }
    }
}

/// Proposed resource footprint of a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSpec {
    /// CPU request in millicores
    pub cpu_request: u64,
    /// Memory request in bytes
    pub memory_request: Option<u64>,
    pub min_scale: u32,
    pub max_scale: u32,
}
