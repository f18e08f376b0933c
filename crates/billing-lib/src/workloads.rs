//! Workload registry and metrics collaborators
//!
//! Provides:
//! - `WorkloadStore`: the tenant's deployed workloads
//! - `MetricsSource`: fresh per-workload metrics from the orchestrator
//! - In-memory implementations of both

use crate::models::{RawMetrics, Workload};
use async_trait::async_trait;
use dashmap::DashMap;

/// Read access to deployed workloads
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    async fn workload(&self, workload_id: &str) -> anyhow::Result<Option<Workload>>;

    /// All workloads owned by `tenant_id`, ordered by id
    async fn workloads_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Vec<Workload>>;

    /// Every known workload, ordered by id
    async fn all_workloads(&self) -> anyhow::Result<Vec<Workload>>;
}

/// Source of fresh metrics for a workload.
///
/// `Ok(None)` means the orchestrator has nothing for this workload yet.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, workload: &Workload) -> anyhow::Result<Option<RawMetrics>>;
}

/// Workloads held in process memory, keyed by id
#[derive(Default)]
pub struct InMemoryWorkloadStore {
    workloads: DashMap<String, Workload>,
}

impl InMemoryWorkloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workloads(workloads: impl IntoIterator<Item = Workload>) -> Self {
        let store = Self::new();
        for workload in workloads {
            store.upsert(workload);
        }
        store
    }

    pub fn upsert(&self, workload: Workload) {
        self.workloads.insert(workload.id.clone(), workload);
    }

    pub fn remove(&self, workload_id: &str) -> Option<Workload> {
        self.workloads.remove(workload_id).map(|(_, w)| w)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    fn sorted(mut workloads: Vec<Workload>) -> Vec<Workload> {
        workloads.sort_by(|a, b| a.id.cmp(&b.id));
        workloads
    }
}

#[async_trait]
impl WorkloadStore for InMemoryWorkloadStore {
    async fn workload(&self, workload_id: &str) -> anyhow::Result<Option<Workload>> {
        Ok(self.workloads.get(workload_id).map(|w| w.value().clone()))
    }

    async fn workloads_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Vec<Workload>> {
        Ok(Self::sorted(
            self.workloads
                .iter()
                .filter(|entry| entry.tenant_id == tenant_id)
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }

    async fn all_workloads(&self) -> anyhow::Result<Vec<Workload>> {
        Ok(Self::sorted(
            self.workloads.iter().map(|entry| entry.value().clone()).collect(),
        ))
    }
}

/// Metrics pushed into memory by whoever scrapes the orchestrator
#[derive(Default)]
pub struct InMemoryMetricsSource {
    metrics: DashMap<String, RawMetrics>,
}

impl InMemoryMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest metrics for a workload, replacing older ones
    pub fn record(&self, workload_id: impl Into<String>, metrics: RawMetrics) {
        self.metrics.insert(workload_id.into(), metrics);
    }
}

#[async_trait]
impl MetricsSource for InMemoryMetricsSource {
    async fn fetch(&self, workload: &Workload) -> anyhow::Result<Option<RawMetrics>> {
        Ok(self.metrics.get(&workload.id).map(|m| m.value().clone()))
    }
}
