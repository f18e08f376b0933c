//! Billing engine daemon
//!
//! Provides:
//! - Configuration loading (`EngineConfig`)
//! - Seeding of the in-memory stores from a catalog file
//! - The periodic cost refresh and subscription sweep worker
//! - Health, readiness and Prometheus endpoints

pub mod api;
pub mod catalog;
pub mod config;
pub mod worker;
