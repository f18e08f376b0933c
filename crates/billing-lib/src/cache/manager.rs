//! Metrics snapshot manager
//!
//! Pulls fresh metrics for a workload, fills in whatever the orchestrator
//! did not report, prices the result for every canonical period and caches
//! the set under `cost:{workload}:{tenant}`.

use super::{cache_key, CachedCostEntry, CostCacheStore};
use crate::config::BillingConfig;
use crate::error::{bounded, Degradation, Outcome};
use crate::models::{BillingPeriod, RawMetrics, ResourceMetricsSnapshot, Workload, WorkloadSpec};
use crate::observability::{BillingMetrics, StructuredLogger};
use crate::pricing::{CostCalculator, RateCard};
use crate::tariff::TariffResolver;
use crate::workloads::MetricsSource;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Recomputes and caches per-workload cost snapshots
#[derive(Clone)]
pub struct CostSnapshotManager {
    config: Arc<BillingConfig>,
    resolver: TariffResolver,
    calculator: CostCalculator,
    cache: Arc<dyn CostCacheStore>,
    source: Option<Arc<dyn MetricsSource>>,
    metrics: BillingMetrics,
    logger: StructuredLogger,
}

impl CostSnapshotManager {
    pub fn new(
        config: Arc<BillingConfig>,
        resolver: TariffResolver,
        cache: Arc<dyn CostCacheStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            calculator: CostCalculator::new(config.clone()),
            config,
            resolver,
            cache,
            source: None,
            metrics: BillingMetrics::new(),
            logger,
        }
    }

    /// Pull metrics from `source` on every refresh instead of relying on the
    /// workload's last captured metrics
    pub fn with_metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Baseline snapshot for a workload that has never reported metrics
    pub fn default_metrics_for(&self, spec: &WorkloadSpec) -> ResourceMetricsSnapshot {
        let defaults = &self.config.workload_defaults;
        ResourceMetricsSnapshot::from_requests(
            u64::from(spec.min_scale).saturating_mul(defaults.cpu_millicores_per_pod),
            spec.memory_request.unwrap_or(defaults.memory_bytes_per_pod),
            defaults.cold_start_count,
            defaults.efficiency_percent,
        )
    }

    /// Fill the fields billing needs from the workload and configured defaults
    fn fill_defaults(&self, raw: &RawMetrics, workload: &Workload) -> ResourceMetricsSnapshot {
        let baseline = self.default_metrics_for(&workload.spec());
        let mut snapshot = raw.to_snapshot();

        if raw.total_cpu_request.is_none() {
            snapshot.total_cpu_request = baseline.total_cpu_request;
        }
        if raw.total_memory_request.is_none() {
            snapshot.total_memory_request = baseline.total_memory_request;
        }
        if raw.cold_start_count.is_none() {
            snapshot.cold_start_count = baseline.cold_start_count;
        }
        if raw.overall_efficiency.is_none() {
            snapshot.overall_efficiency = baseline.overall_efficiency;
        }
        snapshot
    }

    async fn current_metrics(&self, workload: &Workload, reasons: &mut Vec<Degradation>) -> RawMetrics {
        let Some(source) = &self.source else {
            return workload.metrics.clone();
        };

        match bounded("fetch_metrics", self.config.store_timeout(), source.fetch(workload)).await {
            Ok(Some(metrics)) => metrics,
            Ok(None) => workload.metrics.clone(),
            Err(e) => {
                warn!(workload_id = %workload.id, error = %e, "Metrics source failed, using captured metrics");
                reasons.push(Degradation::MetricsUnavailable(e.to_string()));
                workload.metrics.clone()
            }
        }
    }

    /// Snapshot billing would use for `workload` right now
    pub(crate) async fn snapshot_for(
        &self,
        workload: &Workload,
        reasons: &mut Vec<Degradation>,
    ) -> ResourceMetricsSnapshot {
        let raw = self.current_metrics(workload, reasons).await;
        self.fill_defaults(&raw, workload)
    }

    /// Recompute every period's breakdown for `workload` billed to
    /// `tenant_id` and cache the set.
    ///
    /// Never propagates errors: a computation failure leaves the cache
    /// untouched and returns `Outcome::Failed`.
    pub async fn refresh_now(&self, workload: &Workload, tenant_id: &str) -> Outcome<CachedCostEntry> {
        let mut reasons = Vec::new();
        let snapshot = self.snapshot_for(workload, &mut reasons).await;

        let resolution = self.resolver.resolve(Some(tenant_id)).await;
        let (rates, rate_reasons) = RateCard::for_resolution(&resolution, &self.config.rates);
        reasons.extend(rate_reasons);

        let mut costs = BTreeMap::new();
        for period in BillingPeriod::ALL {
            let hours = self.config.periods.hours(period);
            match self.calculator.compute(&snapshot, &rates, hours, None) {
                Ok(breakdown) => {
                    costs.insert(period, breakdown);
                }
                Err(e) => {
                    self.metrics.inc_cache_refresh_failures();
                    self.logger
                        .log_cache_refresh_failed(&workload.id, tenant_id, &e.to_string());
                    return Outcome::Failed(e.to_string());
                }
            }
        }

        let captured_at = Utc::now();
        let ttl = self.config.cache_ttl();
        let entry = CachedCostEntry {
            workload_id: workload.id.clone(),
            tenant_id: tenant_id.to_string(),
            costs,
            metrics_used: snapshot,
            captured_at,
            expires_at: chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| captured_at.checked_add_signed(ttl)),
            degradations: reasons.clone(),
        };

        let key = cache_key(&workload.id, tenant_id);
        let stored = bounded(
            "cache_put",
            self.config.store_timeout(),
            self.cache.put(&key, entry.clone(), ttl),
        )
        .await;
        if let Err(e) = stored {
            warn!(key = %key, error = %e, "Could not cache cost entry");
            reasons.push(Degradation::CacheUnavailable(e.to_string()));
        }
        self.metrics.set_cached_entries(i64::try_from(self.cache.len()).unwrap_or(i64::MAX));

        self.logger.log_cache_refreshed(
            &workload.id,
            tenant_id,
            !reasons.is_empty(),
            self.config.cache_ttl_secs,
        );
        Outcome::from_parts(entry, reasons)
    }

    /// The unexpired entry for (workload, tenant), if any
    pub async fn get_cached(&self, workload_id: &str, tenant_id: &str) -> Option<CachedCostEntry> {
        let key = cache_key(workload_id, tenant_id);
        match bounded("cache_get", self.config.store_timeout(), self.cache.get(&key)).await {
            Ok(Some(entry)) => {
                self.metrics.inc_cache_hits();
                Some(entry)
            }
            Ok(None) => {
                self.metrics.inc_cache_misses();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cost cache read failed, treating as miss");
                self.metrics.inc_cache_misses();
                None
            }
        }
    }

    /// Cached entry if fresh, otherwise a new computation
    pub async fn get_or_refresh(&self, workload: &Workload, tenant_id: &str) -> Outcome<CachedCostEntry> {
        match self.get_cached(&workload.id, tenant_id).await {
            Some(entry) => Outcome::Complete(entry),
            None => self.refresh_now(workload, tenant_id).await,
        }
    }

    /// Evict expired entries so costs of removed workloads do not linger
    pub fn purge_expired(&self) -> usize {
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged = purged, "Purged expired cost entries");
        }
        self.metrics.set_cached_entries(i64::try_from(self.cache.len()).unwrap_or(i64::MAX));
        purged
    }

    /// Invalidate the entry for (workload, tenant); true if one was removed
    pub async fn clear(&self, workload_id: &str, tenant_id: &str) -> bool {
        let key = cache_key(workload_id, tenant_id);
        let removed = match bounded("cache_remove", self.config.store_timeout(), self.cache.remove(&key)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key = %key, error = %e, "Cost cache invalidation failed");
                false
            }
        };
        debug!(key = %key, removed = removed, "Cleared cost cache entry");
        self.metrics.set_cached_entries(i64::try_from(self.cache.len()).unwrap_or(i64::MAX));
        removed
    }
}
