//! Background refresh of cached workload costs and subscription sweeps

use billing_lib::{
    health::components, BillingEngine, HealthRegistry, RefreshSummary, StructuredLogger,
};
use billing_lib::tariff::SweepReport;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Drives `refresh_all` and the subscription sweep on fixed intervals
pub struct RefreshWorker {
    engine: BillingEngine,
    health: HealthRegistry,
    logger: StructuredLogger,
    refresh_interval: Duration,
    sweep_interval: Duration,
}

impl RefreshWorker {
    pub fn new(
        engine: BillingEngine,
        health: HealthRegistry,
        logger: StructuredLogger,
        refresh_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            engine,
            health,
            logger,
            refresh_interval,
            sweep_interval,
        }
    }

    /// One refresh pass; health reflects the outcome
    pub async fn refresh_once(&self) -> Option<RefreshSummary> {
        match self.engine.refresh_all().await {
            Ok(summary) => {
                debug!(
                    refreshed = summary.refreshed,
                    degraded = summary.degraded,
                    failed = summary.failed,
                    purged = summary.purged,
                    "Refresh pass finished"
                );
                self.health.set_healthy(components::WORKLOAD_STORE).await;
                self.health.observe_refresh(&summary).await;
                Some(summary)
            }
            Err(e) => {
                warn!(error = %e, "Could not list workloads for refresh");
                self.health
                    .set_unhealthy(components::WORKLOAD_STORE, e.to_string())
                    .await;
                None
            }
        }
    }

    /// One subscription sweep; a store failure degrades the tariff store
    pub async fn sweep_once(&self) -> Option<SweepReport> {
        match self.engine.sweep_subscriptions(Utc::now()).await {
            Ok(report) => {
                self.health.set_healthy(components::TARIFF_STORE).await;
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Subscription sweep failed");
                self.health
                    .set_degraded(components::TARIFF_STORE, e.to_string())
                    .await;
                None
            }
        }
    }

    /// Run until `shutdown` fires; both timers tick immediately on start
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut refresh = interval(self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    self.refresh_once().await;
                }
                _ = sweep.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    self.logger.log_shutdown("refresh worker stopped");
                    break;
                }
            }
        }
    }
}
