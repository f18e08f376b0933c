//! Efficiency and performance scoring
//!
//! Derives dimensionless scores from a metrics snapshot. Every function here
//! is pure and total: zero or absent inputs produce zero scores, never errors.

use crate::models::ResourceMetricsSnapshot;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = dec!(100);

/// Replica count at which savings potential counts in full
const FULL_SCALE_PODS: Decimal = dec!(10);

/// Uptime is scored in hour-sized points, capped at this many
const MAX_UPTIME_POINTS: Decimal = dec!(100);

/// Points lost per second of worst cold-start latency
const COLD_START_POINTS_PER_SEC: Decimal = dec!(10);

/// Cold-start penalty never exceeds this many points
const MAX_COLD_START_PENALTY: Decimal = dec!(50);

const SECONDS_PER_HOUR: Decimal = dec!(3600);

/// Derived efficiency figures for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyResult {
    pub cpu_efficiency: Decimal,
    pub memory_efficiency: Decimal,
    pub overall_efficiency: Decimal,
    pub cost_saving_percent: Decimal,
    pub performance_score: Decimal,
}

/// Usage over request as a percentage in [0, 100]; 0 without a request
pub fn utilization_percent(usage: Decimal, requested: Decimal) -> Decimal {
    if requested <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (usage / requested * HUNDRED).clamp(Decimal::ZERO, HUNDRED)
}

/// Unrounded overall efficiency, the mean of CPU and memory utilization
pub fn overall_efficiency(snapshot: &ResourceMetricsSnapshot) -> Decimal {
    let cpu = utilization_percent(snapshot.total_cpu_usage, snapshot.total_cpu_request);
    let memory = utilization_percent(
        Decimal::from(snapshot.total_memory_usage),
        Decimal::from(snapshot.total_memory_request),
    );
    (cpu + memory) / dec!(2)
}

/// Share of reserved capacity that could be recovered, dampened for small
/// deployments: below ten replicas the savings shrink linearly.
pub fn cost_saving_percent(overall_efficiency: Decimal, pod_count: u32) -> Decimal {
    let scale = (Decimal::from(pod_count) / FULL_SCALE_PODS).min(Decimal::ONE);
    ((HUNDRED - overall_efficiency) * scale).max(Decimal::ZERO)
}

/// Sustained uptime score minus a cold-start latency penalty, floored at zero
pub fn performance_score(uptime_seconds: Decimal, max_cold_start_seconds: Decimal) -> Decimal {
    let uptime_points = (uptime_seconds / SECONDS_PER_HOUR).min(MAX_UPTIME_POINTS);
    let penalty = (max_cold_start_seconds * COLD_START_POINTS_PER_SEC).min(MAX_COLD_START_PENALTY);
    (uptime_points - penalty).max(Decimal::ZERO)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Calculator for efficiency metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct EfficiencyCalculator;

impl EfficiencyCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute all efficiency figures, rounded to two places for display
    pub fn calculate(&self, snapshot: &ResourceMetricsSnapshot) -> EfficiencyResult {
        let cpu = utilization_percent(snapshot.total_cpu_usage, snapshot.total_cpu_request);
        let memory = utilization_percent(
            Decimal::from(snapshot.total_memory_usage),
            Decimal::from(snapshot.total_memory_request),
        );
        let overall = (cpu + memory) / dec!(2);

        EfficiencyResult {
            cpu_efficiency: round2(cpu),
            memory_efficiency: round2(memory),
            overall_efficiency: round2(overall),
            cost_saving_percent: round2(cost_saving_percent(overall, snapshot.pod_count)),
            performance_score: round2(performance_score(
                snapshot.total_pod_uptime_seconds,
                snapshot.max_cold_start_time_seconds,
            )),
        }
    }

    /// Efficiency used for pricing: an explicit figure wins, then a figure
    /// derived from usage samples, then 100 (no surcharge, no discount).
    pub fn pricing_efficiency(&self, snapshot: &ResourceMetricsSnapshot) -> Decimal {
        match snapshot.overall_efficiency {
            Some(explicit) => explicit,
            None if snapshot.has_usage_samples => overall_efficiency(snapshot),
            None => HUNDRED,
        }
    }
}
