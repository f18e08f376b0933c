//! Billing Engine - usage metering daemon
//!
//! Keeps the cost cache warm for every known workload, expires lapsed
//! subscriptions and serves health and metrics endpoints.

use anyhow::{Context, Result};
use billing_engine::{
    api,
    catalog::Catalog,
    config::EngineConfig,
    worker::RefreshWorker,
};
use billing_lib::{
    health::components, BillingEngine, BillingMetrics, HealthRegistry, StructuredLogger,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filtered by RUST_LOG
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting billing-engine");

    let config_file = std::env::var_os("BILLING_CONFIG_FILE").map(PathBuf::from);
    let config = EngineConfig::load(config_file.as_deref())?;
    info!(instance_id = %config.instance_id, "Engine configured");

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };
    let workload_count = catalog.workloads.len();

    let health_registry = HealthRegistry::new();
    for component in [
        components::TARIFF_STORE,
        components::WORKLOAD_STORE,
        components::COST_CACHE,
        components::REFRESH_WORKER,
    ] {
        health_registry.register(component).await;
    }

    let metrics = BillingMetrics::new();
    let logger = StructuredLogger::new(&config.instance_id);

    let billing = Arc::new(config.billing.clone());
    let collaborators = catalog.into_collaborators(&billing);
    let engine = BillingEngine::new(billing, collaborators, logger.clone())
        .context("Failed to start billing engine")?;

    let plans = engine.plans().await.context("Failed to list plans")?;
    logger.log_startup(ENGINE_VERSION, plans.len(), workload_count);

    let (shutdown_tx, _) = broadcast::channel(1);

    let worker = RefreshWorker::new(
        engine,
        health_registry.clone(),
        logger.clone(),
        config.refresh_interval(),
        config.sweep_interval(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    if let Err(e) = worker_handle.await {
        error!(error = %e, "Refresh worker panicked");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server panicked"),
        Ok(Ok(())) => {}
    }

    info!("Shutting down");
    Ok(())
}
