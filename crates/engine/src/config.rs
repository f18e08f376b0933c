//! Engine daemon configuration

use anyhow::{Context, Result};
use billing_lib::BillingConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration.
///
/// Read from an optional file, then overridden by `BILLING_`-prefixed
/// environment variables. Nested keys use `__`, e.g.
/// `BILLING_BILLING__CACHE_TTL_SECS=60`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between cost cache refresh passes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Seconds between subscription expiry sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// JSON file with plans, subscriptions and workloads to seed
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub billing: BillingConfig,
}

fn default_instance_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "billing-engine".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            api_port: default_api_port(),
            refresh_interval_secs: default_refresh_interval(),
            sweep_interval_secs: default_sweep_interval(),
            catalog_path: None,
            billing: BillingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `file` (if given) and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("BILLING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read engine configuration")?;

        let config: EngineConfig = config
            .try_deserialize()
            .context("Invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.refresh_interval_secs > 0, "refresh_interval_secs must be positive");
        anyhow::ensure!(self.sweep_interval_secs > 0, "sweep_interval_secs must be positive");
        self.billing.validate()?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
