//! Short-lived cost cache backing the near-real-time dashboard
//!
//! This module provides:
//! - `CostCacheStore`: TTL key/value storage for computed breakdown sets
//! - `InMemoryCostCache`: `DashMap`-backed store with lazy expiry
//! - `CostSnapshotManager`: recompute, cache and serve per-workload costs

mod manager;
mod memory;

pub use manager::CostSnapshotManager;
pub use memory::InMemoryCostCache;

use crate::error::Degradation;
use crate::models::{BillingPeriod, ResourceMetricsSnapshot};
use crate::pricing::CostBreakdown;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cache key for a (workload, tenant) pair
pub fn cache_key(workload_id: &str, tenant_id: &str) -> String {
    format!("cost:{workload_id}:{tenant_id}")
}

/// Breakdowns for every canonical period, computed from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCostEntry {
    pub workload_id: String,
    pub tenant_id: String,
    pub costs: BTreeMap<BillingPeriod, CostBreakdown>,
    /// Snapshot the breakdowns were computed from, defaults filled in
    pub metrics_used: ResourceMetricsSnapshot,
    pub captured_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Inputs that fell back to defaults while computing this entry
    #[serde(default)]
    pub degradations: Vec<Degradation>,
}

impl CachedCostEntry {
    pub fn cost(&self, period: BillingPeriod) -> Option<&CostBreakdown> {
        self.costs.get(&period)
    }
}

/// TTL key/value storage for cost entries.
///
/// Expired entries must never be returned; how and when they are evicted is
/// up to the implementation.
#[async_trait]
pub trait CostCacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CachedCostEntry>>;

    /// Store `entry`, replacing any previous one (last writer wins)
    async fn put(&self, key: &str, entry: CachedCostEntry, ttl: Duration) -> anyhow::Result<()>;

    async fn remove(&self, key: &str) -> anyhow::Result<bool>;

    /// Evict every expired entry; returns how many were removed. Stores
    /// that expire on their own keep the default.
    fn purge_expired(&self) -> usize {
        0
    }

    /// Number of entries currently held, expired ones included
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
