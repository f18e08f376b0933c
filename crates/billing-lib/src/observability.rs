//! Observability infrastructure for the billing engine
//!
//! Provides:
//! - Prometheus metrics (computation latency, outcomes, tariff fallbacks, cache activity, limit rejections)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use rust_decimal::Decimal;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for computation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<BillingMetricsInner> = OnceLock::new();

struct BillingMetricsInner {
    computation_latency_seconds: Histogram,
    computations_total: IntCounterVec,
    tariff_fallbacks_total: IntCounterVec,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    cache_refresh_failures_total: IntCounter,
    limit_rejections_total: IntCounterVec,
    cached_entries: IntGauge,
}

impl BillingMetricsInner {
    fn new() -> Self {
        Self {
            computation_latency_seconds: register_histogram!(
                "billing_engine_computation_latency_seconds",
                "Time spent resolving a tariff and computing a cost breakdown",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register computation_latency_seconds"),

            computations_total: register_int_counter_vec!(
                "billing_engine_computations_total",
                "Cost computations by outcome",
                &["outcome"]
            )
            .expect("Failed to register computations_total"),

            tariff_fallbacks_total: register_int_counter_vec!(
                "billing_engine_tariff_fallbacks_total",
                "Computations that fell back to configured rates",
                &["reason"]
            )
            .expect("Failed to register tariff_fallbacks_total"),

            cache_hits_total: register_int_counter!(
                "billing_engine_cache_hits_total",
                "Cost cache lookups answered from an unexpired entry"
            )
            .expect("Failed to register cache_hits_total"),

            cache_misses_total: register_int_counter!(
                "billing_engine_cache_misses_total",
                "Cost cache lookups that found nothing or an expired entry"
            )
            .expect("Failed to register cache_misses_total"),

            cache_refresh_failures_total: register_int_counter!(
                "billing_engine_cache_refresh_failures_total",
                "Snapshot refreshes that produced no breakdown"
            )
            .expect("Failed to register cache_refresh_failures_total"),

            limit_rejections_total: register_int_counter_vec!(
                "billing_engine_limit_rejections_total",
                "Plan limit checks that failed, by check",
                &["check"]
            )
            .expect("Failed to register limit_rejections_total"),

            cached_entries: register_int_gauge!(
                "billing_engine_cached_entries",
                "Number of cost entries currently held in the cache"
            )
            .expect("Failed to register cached_entries"),
        }
    }
}

/// Billing metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct BillingMetrics {
    _private: (),
}

impl Default for BillingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(BillingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &BillingMetricsInner {
        GLOBAL_METRICS.get_or_init(BillingMetricsInner::new)
    }

    pub fn observe_computation_latency(&self, duration_secs: f64) {
        self.inner().computation_latency_seconds.observe(duration_secs);
    }

    /// Count a computation; `outcome` is complete, degraded or failed
    pub fn inc_computations(&self, outcome: &str) {
        self.inner()
            .computations_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_tariff_fallbacks(&self, reason: &str) {
        self.inner()
            .tariff_fallbacks_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits_total.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses_total.inc();
    }

    pub fn inc_cache_refresh_failures(&self) {
        self.inner().cache_refresh_failures_total.inc();
    }

    pub fn inc_limit_rejections(&self, check: &str) {
        self.inner()
            .limit_rejections_total
            .with_label_values(&[check])
            .inc();
    }

    pub fn set_cached_entries(&self, count: i64) {
        self.inner().cached_entries.set(count);
    }
}

/// Structured logger for billing events
///
/// Emits consistently named events so log pipelines can key on `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, plans: usize, workloads: usize) {
        info!(
            event = "engine_started",
            instance = %self.instance,
            engine_version = %version,
            plans = plans,
            workloads = workloads,
            "Billing engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Billing engine shutting down"
        );
    }

    /// Log a finished cost computation
    pub fn log_cost_computed(
        &self,
        tenant_id: Option<&str>,
        tariff_branch: &str,
        period_hours: Decimal,
        total_cost: Decimal,
        degraded: bool,
    ) {
        info!(
            event = "cost_computed",
            instance = %self.instance,
            tenant_id = tenant_id.unwrap_or("-"),
            tariff = tariff_branch,
            period_hours = %period_hours,
            total_cost = %total_cost,
            degraded = degraded,
            "Computed cost breakdown"
        );
    }

    pub fn log_tariff_fallback(&self, tenant_id: Option<&str>, reason: &str) {
        warn!(
            event = "tariff_fallback",
            instance = %self.instance,
            tenant_id = tenant_id.unwrap_or("-"),
            reason = %reason,
            "Billing with fallback rates"
        );
    }

    pub fn log_cache_refreshed(&self, workload_id: &str, tenant_id: &str, degraded: bool, ttl_secs: u64) {
        info!(
            event = "cache_refreshed",
            instance = %self.instance,
            workload_id = %workload_id,
            tenant_id = %tenant_id,
            degraded = degraded,
            ttl_secs = ttl_secs,
            "Refreshed cached costs"
        );
    }

    pub fn log_cache_refresh_failed(&self, workload_id: &str, tenant_id: &str, reason: &str) {
        warn!(
            event = "cache_refreshed",
            instance = %self.instance,
            workload_id = %workload_id,
            tenant_id = %tenant_id,
            reason = %reason,
            "Cost refresh failed, cache left untouched"
        );
    }

    /// Log a limit check; rejections are warnings
    pub fn log_limit_check(&self, tenant_id: Option<&str>, allowed: bool, failed: &[&str]) {
        if allowed {
            info!(
                event = "limit_check",
                instance = %self.instance,
                tenant_id = tenant_id.unwrap_or("-"),
                allowed = true,
                "Workload within plan limits"
            );
        } else {
            warn!(
                event = "limit_check",
                instance = %self.instance,
                tenant_id = tenant_id.unwrap_or("-"),
                allowed = false,
                failed = ?failed,
                "Workload exceeds plan limits"
            );
        }
    }

    pub fn log_subscriptions_swept(&self, renewed: usize, expired: usize) {
        info!(
            event = "subscriptions_swept",
            instance = %self.instance,
            renewed = renewed,
            expired = expired,
            "Processed lapsed subscriptions"
        );
    }
}
