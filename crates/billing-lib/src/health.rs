//! Component health and readiness for the billing engine
//!
//! Collaborator health is inferred from the degradations that billing
//! operations report, so no separate probing is needed.

use crate::engine::RefreshSummary;
use crate::error::Degradation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working, but answers fall back to defaults
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn at(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::at(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::at(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// The worst status among `components`; healthy when empty
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const TARIFF_STORE: &str = "tariff_store";
    pub const WORKLOAD_STORE: &str = "workload_store";
    pub const COST_CACHE: &str = "cost_cache";
    pub const METRICS_SOURCE: &str = "metrics_source";
    pub const REFRESH_WORKER: &str = "refresh_worker";
}

/// Component that a degradation points at
fn component_for(degradation: &Degradation) -> &'static str {
    match degradation {
        Degradation::TariffUnavailable(_) | Degradation::FallbackRates(_) => components::TARIFF_STORE,
        Degradation::MetricsUnavailable(_) => components::METRICS_SOURCE,
        Degradation::CacheUnavailable(_) => components::COST_CACHE,
        Degradation::UsageUnavailable(_) => components::WORKLOAD_STORE,
    }
}

fn describe(degradation: &Degradation) -> String {
    match degradation {
        Degradation::TariffUnavailable(reason) => format!("tariff store unavailable: {reason}"),
        Degradation::FallbackRates(fields) => format!("plan missing rates: {}", fields.join(", ")),
        Degradation::MetricsUnavailable(reason) => format!("metrics unavailable: {reason}"),
        Degradation::CacheUnavailable(reason) => format!("cache unavailable: {reason}"),
        Degradation::UsageUnavailable(reason) => format!("workloads unavailable: {reason}"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Mark the collaborators behind `degradations` as degraded
    pub async fn observe_degradations(&self, degradations: &[Degradation]) {
        for degradation in degradations {
            self.set_degraded(component_for(degradation), describe(degradation))
                .await;
        }
    }

    /// Fold a refresh pass into the refresh worker's status.
    ///
    /// A pass where every workload failed is unhealthy; partial failure or
    /// degraded refreshes are degraded.
    pub async fn observe_refresh(&self, summary: &RefreshSummary) {
        let total = summary.refreshed + summary.failed;
        let health = if summary.failed > 0 && summary.failed == total {
            ComponentHealth::unhealthy(format!("all {total} refreshes failed"))
        } else if summary.failed > 0 {
            ComponentHealth::degraded(format!("{} of {total} refreshes failed", summary.failed))
        } else if summary.degraded > 0 {
            ComponentHealth::degraded(format!("{} refreshes used fallbacks", summary.degraded))
        } else {
            ComponentHealth::healthy()
        };
        self.update(components::REFRESH_WORKER, health).await;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup completed and nothing is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("Engine not yet initialized".to_string())
        } else if !health.status.is_operational() {
            let failing: Vec<&str> = health
                .components
                .iter()
                .filter(|(_, c)| !c.status.is_operational())
                .map(|(name, _)| name.as_str())
                .collect();
            Some(format!("Unhealthy components: {}", failing.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_degradations_mark_collaborators() {
        let registry = HealthRegistry::new();
        registry.register(components::TARIFF_STORE).await;
        registry.register(components::COST_CACHE).await;

        registry
            .observe_degradations(&[Degradation::TariffUnavailable("timeout".into())])
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::TARIFF_STORE].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::COST_CACHE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_refresh_summary_statuses() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;

        registry
            .observe_refresh(&RefreshSummary {
                refreshed: 3,
                degraded: 0,
                failed: 1,
                ..Default::default()
            })
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);

        registry
            .observe_refresh(&RefreshSummary {
                refreshed: 0,
                degraded: 0,
                failed: 2,
                ..Default::default()
            })
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains(components::REFRESH_WORKER));

        registry.observe_refresh(&RefreshSummary::default()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }
}
