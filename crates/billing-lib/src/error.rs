//! Error and outcome types for the billing engine
//!
//! Hard failures (bad input, broken configuration) are `BillingError`.
//! Everything the engine can recover from by falling back to defaults is
//! reported through `Outcome` so callers can tell a degraded estimate from a
//! fully resolved one without parsing logs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the billing engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("Store error: {0}")]
    Store(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillingError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

/// Run a collaborator call under a deadline, folding both failure kinds into
/// `BillingError`
pub(crate) async fn bounded<T, F>(operation: &'static str, after: Duration, call: F) -> Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BillingError::Store(format!("{operation}: {e:#}"))),
        Err(_) => Err(BillingError::Timeout { operation, after }),
    }
}

/// A recoverable gap that was papered over with defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Degradation {
    /// The tariff store failed or timed out; hardcoded rates were used
    TariffUnavailable(String),
    /// A plan resolved but one or more rate fields were missing
    FallbackRates(Vec<String>),
    /// No live metrics; configured per-workload defaults were used
    MetricsUnavailable(String),
    /// The cache could not be read or written; values were recomputed
    CacheUnavailable(String),
    /// The tenant's workloads could not be listed; usage counted as zero
    UsageUnavailable(String),
}

/// Result of an availability-first operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Computed from resolved configuration and live data
    Complete(T),
    /// Computed, but at least one input fell back to a default
    Degraded { value: T, reasons: Vec<Degradation> },
    /// Nothing could be produced
    Failed(String),
}

impl<T> Outcome<T> {
    /// Build a complete or degraded outcome depending on `reasons`
    pub fn from_parts(value: T, reasons: Vec<Degradation>) -> Self {
        if reasons.is_empty() {
            Outcome::Complete(value)
        } else {
            Outcome::Degraded { value, reasons }
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn reasons(&self) -> &[Degradation] {
        match self {
            Outcome::Degraded { reasons, .. } => reasons,
            _ => &[],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Complete(value) => Outcome::Complete(f(value)),
            Outcome::Degraded { value, reasons } => Outcome::Degraded {
                value: f(value),
                reasons,
            },
            Outcome::Failed(reason) => Outcome::Failed(reason),
        }
    }
}
