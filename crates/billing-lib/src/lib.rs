//! Billing library for a Functions-as-a-Service platform
//!
//! This crate provides the core functionality for:
//! - Efficiency scoring of workload resource usage
//! - Tariff plan resolution and subscription lifecycle
//! - Cost calculation with efficiency and cold-start adjustments
//! - Plan limit enforcement
//! - A short-lived cost cache for dashboards
//! - Health checks and observability

pub mod cache;
pub mod config;
pub mod efficiency;
pub mod engine;
pub mod error;
pub mod health;
pub mod limits;
pub mod models;
pub mod observability;
pub mod pricing;
pub mod tariff;
pub mod workloads;

pub use cache::{CachedCostEntry, CostCacheStore, CostSnapshotManager, InMemoryCostCache};
pub use config::BillingConfig;
pub use efficiency::{EfficiencyCalculator, EfficiencyResult};
pub use engine::{BillingEngine, Collaborators, EstimateRequest, RefreshSummary, TenantBill};
pub use error::{BillingError, Degradation, Outcome, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use limits::{LimitCheck, PlanLimitChecker};
pub use models::*;
pub use observability::{BillingMetrics, StructuredLogger};
pub use pricing::{CostBreakdown, CostCalculator, RateCard};
pub use tariff::{
    InMemoryTariffStore, PlanLimits, PlanTier, SubscriptionStatus, TariffPlan, TariffResolution,
    TariffResolver, TariffStore, TenantSubscription,
};
pub use workloads::{InMemoryMetricsSource, InMemoryWorkloadStore, MetricsSource, WorkloadStore};
