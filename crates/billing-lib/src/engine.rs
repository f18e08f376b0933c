//! Billing engine facade
//!
//! Wires tariff resolution, cost calculation, limit checks and the cost
//! cache behind one cloneable handle. Every operation is safe to call
//! concurrently; the cache is the only shared mutable state.

use crate::cache::{CachedCostEntry, CostCacheStore, CostSnapshotManager, InMemoryCostCache};
use crate::config::BillingConfig;
use crate::efficiency::{EfficiencyCalculator, EfficiencyResult};
use crate::error::{bounded, BillingError, Outcome, Result};
use crate::limits::{LimitCheck, PlanLimitChecker};
use crate::models::{BillingPeriod, ResourceMetricsSnapshot, Workload, WorkloadSpec};
use crate::observability::{BillingMetrics, StructuredLogger};
use crate::pricing::{CostBreakdown, CostCalculator, RateCard};
use crate::tariff::{
    sweep_expired, InMemoryTariffStore, SweepReport, TariffPlan, TariffResolution, TariffResolver,
    TariffStore,
};
use crate::workloads::{InMemoryWorkloadStore, MetricsSource, WorkloadStore};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// External systems the engine reads from and writes to
#[derive(Clone)]
pub struct Collaborators {
    pub tariffs: Arc<dyn TariffStore>,
    pub workloads: Arc<dyn WorkloadStore>,
    pub cache: Arc<dyn CostCacheStore>,
    pub metrics_source: Option<Arc<dyn MetricsSource>>,
}

impl Collaborators {
    /// In-memory stores provisioned with the configured tier catalog
    pub fn in_memory(config: &BillingConfig) -> Self {
        Self {
            tariffs: Arc::new(InMemoryTariffStore::with_catalog(&config.tiers, &config.rates)),
            workloads: Arc::new(InMemoryWorkloadStore::new()),
            cache: Arc::new(InMemoryCostCache::new()),
            metrics_source: None,
        }
    }
}

/// Inputs of a pre-deployment estimate; absent fields use the configured
/// estimation defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateRequest {
    /// Millicores
    pub cpu_request: Option<u64>,
    /// Bytes
    pub memory_request: Option<u64>,
    pub expected_cold_starts: Option<u64>,
    /// Percent
    pub expected_efficiency: Option<Decimal>,
    pub period: Option<BillingPeriod>,
}

/// A workload's line on a tenant bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadCost {
    pub workload_id: String,
    pub name: String,
    pub breakdown: CostBreakdown,
}

/// Costs of every workload a tenant owns over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantBill {
    pub tenant_id: String,
    pub period_hours: Decimal,
    pub workloads: Vec<WorkloadCost>,
    /// Sum of the per-workload totals
    pub total_cost: Decimal,
}

/// Summary of one pass over every known workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Expired cache entries evicted before the pass
    #[serde(default)]
    pub purged: usize,
}

/// Hours elapsed since the start of `now`'s calendar month (UTC)
pub fn month_to_date_hours(now: DateTime<Utc>) -> Decimal {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let seconds = (now - start).num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(3600)
}

/// Entry point for every billing operation
#[derive(Clone)]
pub struct BillingEngine {
    config: Arc<BillingConfig>,
    collaborators: Collaborators,
    resolver: TariffResolver,
    calculator: CostCalculator,
    efficiency: EfficiencyCalculator,
    limits: PlanLimitChecker,
    snapshots: CostSnapshotManager,
    metrics: BillingMetrics,
    logger: StructuredLogger,
}

impl BillingEngine {
    pub fn new(config: Arc<BillingConfig>, collaborators: Collaborators, logger: StructuredLogger) -> Result<Self> {
        config.validate()?;

        let resolver = TariffResolver::new(collaborators.tariffs.clone(), &config);
        let limits = PlanLimitChecker::new(
            config.clone(),
            resolver.clone(),
            collaborators.workloads.clone(),
            logger.clone(),
        );
        let mut snapshots = CostSnapshotManager::new(
            config.clone(),
            resolver.clone(),
            collaborators.cache.clone(),
            logger.clone(),
        );
        if let Some(source) = &collaborators.metrics_source {
            snapshots = snapshots.with_metrics_source(source.clone());
        }

        Ok(Self {
            calculator: CostCalculator::new(config.clone()),
            efficiency: EfficiencyCalculator::new(),
            config,
            collaborators,
            resolver,
            limits,
            snapshots,
            metrics: BillingMetrics::new(),
            logger,
        })
    }

    /// Engine over in-memory stores seeded with the canonical tiers
    pub fn in_memory(config: BillingConfig) -> Result<Self> {
        let collaborators = Collaborators::in_memory(&config);
        Self::new(Arc::new(config), collaborators, StructuredLogger::new("in-memory"))
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &CostSnapshotManager {
        &self.snapshots
    }

    pub fn tariffs(&self) -> &Arc<dyn TariffStore> {
        &self.collaborators.tariffs
    }

    pub fn workloads(&self) -> &Arc<dyn WorkloadStore> {
        &self.collaborators.workloads
    }

    /// Resolve the tenant's plan through the fallback chain
    pub async fn resolve_tariff(&self, tenant_id: Option<&str>) -> TariffResolution {
        self.resolver.resolve(tenant_id).await
    }

    /// Price `snapshot` over `period_hours` under the tenant's plan
    pub async fn compute_cost(
        &self,
        tenant_id: Option<&str>,
        snapshot: &ResourceMetricsSnapshot,
        period_hours: Decimal,
        cluster_load: Option<Decimal>,
    ) -> Result<Outcome<CostBreakdown>> {
        let started = Instant::now();
        let resolution = self.resolver.resolve(tenant_id).await;
        let (rates, reasons) = RateCard::for_resolution(&resolution, &self.config.rates);

        let breakdown = match self.calculator.compute(snapshot, &rates, period_hours, cluster_load) {
            Ok(breakdown) => breakdown,
            Err(e) => {
                self.metrics.inc_computations("failed");
                return Err(e);
            }
        };
        self.metrics
            .observe_computation_latency(started.elapsed().as_secs_f64());

        if let TariffResolution::Unavailable(reason) = &resolution {
            self.logger.log_tariff_fallback(tenant_id, reason);
        }
        let outcome = Outcome::from_parts(breakdown, reasons);
        self.metrics.inc_computations(if outcome.is_degraded() {
            "degraded"
        } else {
            "complete"
        });
        if let Some(breakdown) = outcome.value() {
            self.logger.log_cost_computed(
                tenant_id,
                resolution.branch(),
                period_hours,
                breakdown.total_cost,
                outcome.is_degraded(),
            );
        }
        Ok(outcome)
    }

    /// Estimate the cost of a workload before it is deployed
    pub async fn estimate(&self, tenant_id: Option<&str>, request: &EstimateRequest) -> Result<Outcome<CostBreakdown>> {
        let defaults = &self.config.estimation;
        let snapshot = ResourceMetricsSnapshot::from_requests(
            request.cpu_request.unwrap_or(defaults.cpu_millicores),
            request.memory_request.unwrap_or(defaults.memory_bytes),
            request.expected_cold_starts.unwrap_or(defaults.cold_starts),
            request.expected_efficiency.unwrap_or(defaults.efficiency_percent),
        );
        let hours = self
            .config
            .periods
            .hours(request.period.unwrap_or(defaults.period));

        self.compute_cost(tenant_id, &snapshot, hours, None).await
    }

    /// Efficiency figures for a snapshot
    pub fn efficiency(&self, snapshot: &ResourceMetricsSnapshot) -> EfficiencyResult {
        self.efficiency.calculate(snapshot)
    }

    /// Cost of every workload the tenant owns over `period_hours`
    pub async fn bill_tenant(&self, tenant_id: &str, period_hours: Decimal) -> Result<Outcome<TenantBill>> {
        let workloads = bounded(
            "workloads_for_tenant",
            self.config.store_timeout(),
            self.collaborators.workloads.workloads_for_tenant(tenant_id),
        )
        .await?;

        let mut reasons = Vec::new();
        let mut lines = Vec::with_capacity(workloads.len());
        let mut total_cost = Decimal::ZERO;

        for workload in &workloads {
            let snapshot = self.snapshots.snapshot_for(workload, &mut reasons).await;
            let outcome = self
                .compute_cost(Some(tenant_id), &snapshot, period_hours, None)
                .await
                .map_err(|e| match e {
                    BillingError::InvalidInput { field, reason } => BillingError::InvalidInput {
                        field,
                        reason: format!("workload {}: {reason}", workload.id),
                    },
                    other => other,
                })?;

            for reason in outcome.reasons() {
                if !reasons.contains(reason) {
                    reasons.push(reason.clone());
                }
            }
            if let Some(breakdown) = outcome.into_value() {
                total_cost = total_cost.checked_add(breakdown.total_cost).ok_or_else(|| {
                    BillingError::invalid("total_cost", format!("tenant {tenant_id} bill overflowed"))
                })?;
                lines.push(WorkloadCost {
                    workload_id: workload.id.clone(),
                    name: workload.name.clone(),
                    breakdown,
                });
            }
        }

        Ok(Outcome::from_parts(
            TenantBill {
                tenant_id: tenant_id.to_string(),
                period_hours,
                workloads: lines,
                total_cost,
            },
            reasons,
        ))
    }

    /// The tenant's bill from the start of the current month until `now`
    pub async fn bill_month_to_date(&self, tenant_id: &str, now: DateTime<Utc>) -> Result<Outcome<TenantBill>> {
        self.bill_tenant(tenant_id, month_to_date_hours(now)).await
    }

    /// Validate a proposed workload against the tenant's plan quotas
    pub async fn check_limits(&self, spec: &WorkloadSpec, tenant_id: Option<&str>) -> Outcome<LimitCheck> {
        self.limits.check_limits(spec, tenant_id).await
    }

    /// Recompute and cache costs for one workload billed to its owner
    pub async fn refresh_now(&self, workload: &Workload) -> Outcome<CachedCostEntry> {
        self.snapshots.refresh_now(workload, &workload.tenant_id).await
    }

    pub async fn get_cached(&self, workload_id: &str, tenant_id: &str) -> Option<CachedCostEntry> {
        self.snapshots.get_cached(workload_id, tenant_id).await
    }

    pub async fn clear_cached(&self, workload_id: &str, tenant_id: &str) -> bool {
        self.snapshots.clear(workload_id, tenant_id).await
    }

    /// Cached per-period costs for a workload, recomputed when stale
    pub async fn workload_costs(&self, workload_id: &str, tenant_id: &str) -> Result<Option<Outcome<CachedCostEntry>>> {
        let workload = bounded(
            "workload",
            self.config.store_timeout(),
            self.collaborators.workloads.workload(workload_id),
        )
        .await?;

        match workload {
            Some(workload) if workload.tenant_id == tenant_id => {
                Ok(Some(self.snapshots.get_or_refresh(&workload, tenant_id).await))
            }
            _ => Ok(None),
        }
    }

    /// Evict expired cost entries, then refresh cached costs for every
    /// known workload
    pub async fn refresh_all(&self) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary {
            purged: self.snapshots.purge_expired(),
            ..Default::default()
        };

        let workloads = bounded(
            "all_workloads",
            self.config.store_timeout(),
            self.collaborators.workloads.all_workloads(),
        )
        .await?;

        for workload in &workloads {
            match self.refresh_now(workload).await {
                Outcome::Complete(_) => summary.refreshed += 1,
                Outcome::Degraded { .. } => {
                    summary.refreshed += 1;
                    summary.degraded += 1;
                }
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    /// Renew or expire lapsed subscriptions
    pub async fn sweep_subscriptions(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let report = sweep_expired(
            self.collaborators.tariffs.as_ref(),
            now,
            self.config.subscription_term_days,
            self.config.store_timeout(),
        )
        .await?;
        self.logger
            .log_subscriptions_swept(report.renewed, report.expired);
        Ok(report)
    }

    /// Every plan in the store, ordered by tier
    pub async fn plans(&self) -> Result<Vec<TariffPlan>> {
        bounded(
            "plans",
            self.config.store_timeout(),
            self.collaborators.tariffs.plans(),
        )
        .await
    }
}
