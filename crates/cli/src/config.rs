//! Configuration management for the CLI

use anyhow::{Context, Result};
use billing_lib::BillingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration, read from `~/.config/fbill/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Plan tier used when `--plan` is not given
    pub default_plan: Option<String>,
    /// Overrides of the billing defaults (rates, tiers, periods, ...)
    pub billing: BillingConfig,
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = Self::config_path()?;
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        config
            .billing
            .validate()
            .context("Invalid billing configuration")?;
        Ok(config)
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("fbill").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_load_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_plan": "professional", "billing": {{"rates": {{"cold_start_penalty": "0.01"}}}}}}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.default_plan.as_deref(), Some("professional"));
        assert_eq!(config.billing.rates.cold_start_penalty, dec!(0.01));
        assert_eq!(config.billing.cache_ttl_secs, 120);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/fbill.json"))).is_err());
    }
}
