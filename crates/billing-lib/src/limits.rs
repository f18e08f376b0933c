//! Plan limit enforcement
//!
//! Validates a proposed workload footprint against the quotas of the plan
//! that governs the tenant. Read-only: nothing is reserved or recorded.

use crate::config::{BillingConfig, UsageMode};
use crate::error::{bounded, Degradation, Outcome};
use crate::models::{Workload, WorkloadSpec};
use crate::observability::{BillingMetrics, StructuredLogger};
use crate::tariff::{PlanLimits, TariffResolution, TariffResolver};
use crate::workloads::WorkloadStore;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-quota verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitChecks {
    /// Room for one more workload
    pub workloads_limit: bool,
    pub cpu_limit: bool,
    pub memory_limit: bool,
    pub scale_limit: bool,
}

impl LimitChecks {
    pub fn all(&self) -> bool {
        self.workloads_limit && self.cpu_limit && self.memory_limit && self.scale_limit
    }

    /// Names of the checks that failed
    pub fn failed(&self) -> Vec<&'static str> {
        [
            ("workloads_limit", self.workloads_limit),
            ("cpu_limit", self.cpu_limit),
            ("memory_limit", self.memory_limit),
            ("scale_limit", self.scale_limit),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Tenant's existing footprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUsage {
    pub workloads_count: u32,
    /// Millicores
    pub total_cpu: u64,
    /// Bytes
    pub total_memory: u64,
}

/// Result of a limit check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub checks: LimitChecks,
    pub limits: PlanLimits,
    pub current_usage: CurrentUsage,
}

impl LimitCheck {
    /// Evaluate `spec` against `limits` given the tenant's `usage`
    pub fn evaluate(spec: &WorkloadSpec, limits: PlanLimits, usage: CurrentUsage) -> Self {
        let checks = LimitChecks {
            workloads_limit: usage.workloads_count < limits.max_workloads,
            cpu_limit: spec.cpu_request <= limits.max_cpu_per_workload,
            memory_limit: spec.memory_request.unwrap_or(0) <= limits.max_memory_per_workload,
            scale_limit: spec.max_scale <= limits.max_scale,
        };
        Self {
            allowed: checks.all(),
            checks,
            limits,
            current_usage: usage,
        }
    }
}

/// Checks proposed workloads against plan quotas
#[derive(Clone)]
pub struct PlanLimitChecker {
    config: Arc<BillingConfig>,
    resolver: TariffResolver,
    workloads: Arc<dyn WorkloadStore>,
    metrics: BillingMetrics,
    logger: StructuredLogger,
}

impl PlanLimitChecker {
    pub fn new(
        config: Arc<BillingConfig>,
        resolver: TariffResolver,
        workloads: Arc<dyn WorkloadStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            config,
            resolver,
            workloads,
            metrics: BillingMetrics::new(),
            logger,
        }
    }

    /// Check `spec` for `tenant_id`. Anonymous callers are checked against
    /// the entry tier with no existing usage.
    pub async fn check_limits(&self, spec: &WorkloadSpec, tenant_id: Option<&str>) -> Outcome<LimitCheck> {
        let mut reasons = Vec::new();

        let resolution = self.resolver.resolve(tenant_id).await;
        if let TariffResolution::Unavailable(reason) = &resolution {
            reasons.push(Degradation::TariffUnavailable(reason.clone()));
        }
        let limits = PlanLimits::resolve(resolution.plan(), &self.config.fallback_limits);

        let usage = match tenant_id {
            None => CurrentUsage::default(),
            Some(tenant_id) => match self.current_usage(tenant_id).await {
                Ok(usage) => usage,
                Err(e) => {
                    reasons.push(Degradation::UsageUnavailable(e.to_string()));
                    CurrentUsage::default()
                }
            },
        };

        let check = LimitCheck::evaluate(spec, limits, usage);
        let failed = check.checks.failed();
        for name in &failed {
            self.metrics.inc_limit_rejections(name);
        }
        self.logger.log_limit_check(tenant_id, check.allowed, &failed);

        Outcome::from_parts(check, reasons)
    }

    /// Workload count and summed footprint of the tenant's workloads
    pub async fn current_usage(&self, tenant_id: &str) -> crate::Result<CurrentUsage> {
        let workloads = bounded(
            "workloads_for_tenant",
            self.config.store_timeout(),
            self.workloads.workloads_for_tenant(tenant_id),
        )
        .await?;

        let mut usage = CurrentUsage {
            workloads_count: u32::try_from(workloads.len()).unwrap_or(u32::MAX),
            ..Default::default()
        };
        for workload in &workloads {
            let (cpu, memory) = self.footprint(workload);
            usage.total_cpu = usage.total_cpu.saturating_add(cpu);
            usage.total_memory = usage.total_memory.saturating_add(memory);
        }
        Ok(usage)
    }

    fn footprint(&self, workload: &Workload) -> (u64, u64) {
        let replicas = u64::from(workload.min_scale);
        let nominal_cpu = replicas.saturating_mul(self.config.nominal_footprint.cpu_millicores_per_replica);
        let nominal_memory = replicas.saturating_mul(self.config.nominal_footprint.memory_bytes_per_replica);

        match self.config.usage_mode {
            UsageMode::Nominal => (nominal_cpu, nominal_memory),
            UsageMode::Measured => (
                workload
                    .metrics
                    .total_cpu_request
                    .and_then(|cpu| cpu.trunc().to_u64())
                    .unwrap_or(nominal_cpu),
                workload.metrics.total_memory_request.unwrap_or(nominal_memory),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BYTES_PER_GIB, DEFAULT_MEMORY_PER_POD};
    use crate::models::RawMetrics;
    use crate::tariff::InMemoryTariffStore;
    use crate::workloads::InMemoryWorkloadStore;
    use rust_decimal_macros::dec;

    fn workload(id: &str, min_scale: u32, metrics: RawMetrics) -> Workload {
        Workload {
            id: id.to_string(),
            name: id.to_string(),
            tenant_id: "acme".to_string(),
            min_scale,
            max_scale: 5,
            memory_request: None,
            metrics,
        }
    }

    fn checker(config: BillingConfig, workloads: Vec<Workload>) -> PlanLimitChecker {
        let config = Arc::new(config);
        let tariffs = Arc::new(InMemoryTariffStore::with_catalog(&config.tiers, &config.rates));
        PlanLimitChecker::new(
            config.clone(),
            TariffResolver::new(tariffs, &config),
            Arc::new(InMemoryWorkloadStore::with_workloads(workloads)),
            StructuredLogger::new("test"),
        )
    }

    #[test]
    fn test_cpu_over_quota_rejected_alone() {
        let spec = WorkloadSpec {
            cpu_request: 1500,
            memory_request: Some(BYTES_PER_GIB / 2),
            min_scale: 0,
            max_scale: 3,
        };
        let limits = PlanLimits {
            max_workloads: 5,
            max_cpu_per_workload: 1000,
            max_memory_per_workload: BYTES_PER_GIB,
            max_scale: 5,
        };

        let check = LimitCheck::evaluate(&spec, limits, CurrentUsage::default());
        assert!(!check.allowed);
        assert!(!check.checks.cpu_limit);
        assert!(check.checks.memory_limit && check.checks.scale_limit && check.checks.workloads_limit);
        assert_eq!(check.checks.failed(), vec!["cpu_limit"]);
    }

    #[test]
    fn test_workload_headroom_is_strict() {
        let limits = PlanLimits {
            max_workloads: 2,
            ..PlanLimits::default()
        };
        let usage = CurrentUsage {
            workloads_count: 2,
            ..Default::default()
        };
        let check = LimitCheck::evaluate(&WorkloadSpec::default(), limits, usage);
        assert!(!check.checks.workloads_limit);
    }

    #[tokio::test]
    async fn test_nominal_usage_counts_min_scale() {
        let checker = checker(
            BillingConfig::default(),
            vec![
                workload("a", 2, RawMetrics::default()),
                workload("b", 0, RawMetrics::default()),
            ],
        );

        let usage = checker.current_usage("acme").await.unwrap();
        assert_eq!(usage.workloads_count, 2);
        assert_eq!(usage.total_cpu, 2000);
        assert_eq!(usage.total_memory, 2 * DEFAULT_MEMORY_PER_POD);
    }

    #[tokio::test]
    async fn test_measured_usage_prefers_captured_requests() {
        let config = BillingConfig {
            usage_mode: UsageMode::Measured,
            ..Default::default()
        };
        let measured = RawMetrics {
            total_cpu_request: Some(dec!(250.7)),
            total_memory_request: Some(100),
            ..Default::default()
        };
        let checker = checker(
            config,
            vec![workload("a", 3, measured), workload("b", 1, RawMetrics::default())],
        );

        let usage = checker.current_usage("acme").await.unwrap();
        assert_eq!(usage.total_cpu, 250 + 1000);
        assert_eq!(usage.total_memory, 100 + DEFAULT_MEMORY_PER_POD);
    }

    #[tokio::test]
    async fn test_check_uses_entry_tier_for_anonymous() {
        let checker = checker(BillingConfig::default(), vec![]);
        let spec = WorkloadSpec {
            cpu_request: 2000,
            memory_request: Some(BYTES_PER_GIB),
            min_scale: 0,
            max_scale: 5,
        };

        let outcome = checker.check_limits(&spec, None).await;
        let check = outcome.value().unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(check.limits.max_cpu_per_workload, 1000);
        assert!(!check.allowed);
        assert_eq!(check.current_usage, CurrentUsage::default());
    }
}
