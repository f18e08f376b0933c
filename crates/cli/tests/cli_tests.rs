//! CLI integration tests

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use std::process::{Command, Output};
use std::str::FromStr;

/// Run `fbill` with an empty home directory so no user config is picked up
fn fbill(args: &[&str]) -> Output {
    let home = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_fbill"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("FBILL_CONFIG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

#[test]
fn test_cli_help() {
    let output = fbill(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("FaaS billing"), "Should show app name");
    for command in ["plans", "estimate", "efficiency", "limits"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
    assert!(stdout.contains("FBILL_CONFIG"), "Should show env var");
}

#[test]
fn test_cli_version() {
    let output = fbill(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("fbill"));
}

#[test]
fn test_plans_json_lists_three_tiers() {
    let output = fbill(&["--format", "json", "plans"]);
    assert!(output.status.success());

    let plans = json(&output);
    let tiers: Vec<&str> = plans
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["tier"].as_str().unwrap())
        .collect();
    assert_eq!(tiers, ["STARTER", "PROFESSIONAL", "ENTERPRISE"]);
}

#[test]
fn test_plans_table() {
    let output = fbill(&["plans"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Tier"));
    assert!(stdout.contains("PROFESSIONAL"));
}

#[test]
fn test_estimate_defaults() {
    let output = fbill(&["--format", "json", "estimate"]);
    assert!(output.status.success());

    let estimate = json(&output);
    assert_eq!(decimal(&estimate["breakdown"]["final_cost"]), dec!(2.925));
    assert_eq!(decimal(&estimate["breakdown"]["total_cost"]), dec!(2.925));
    assert_eq!(estimate["degraded"], false);
}

#[test]
fn test_estimate_with_quantities() {
    let output = fbill(&[
        "--format", "json", "estimate", "--cpu", "1", "--memory", "1Gi", "--efficiency", "100",
        "--period", "hour",
    ]);
    assert!(output.status.success());

    let breakdown = &json(&output)["breakdown"];
    assert_eq!(decimal(&breakdown["cpu_cost"]), dec!(0.002));
    assert_eq!(decimal(&breakdown["memory_cost"]), dec!(0.001));
    assert_eq!(decimal(&breakdown["final_cost"]), dec!(0.0039));
}

#[test]
fn test_estimate_on_paid_plan_includes_plan_share() {
    let output = fbill(&["--format", "json", "estimate", "--plan", "enterprise"]);
    assert!(output.status.success());

    let estimate = json(&output);
    let breakdown = &estimate["breakdown"];
    assert!(decimal(&breakdown["fixed_plan_cost"]) > Decimal::ZERO);
    assert_eq!(
        decimal(&breakdown["total_cost"]),
        decimal(&breakdown["final_cost"]) + decimal(&breakdown["fixed_plan_cost"])
    );
}

#[test]
fn test_config_file_overrides_rates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"billing": {{"rates": {{"cpu_rate_per_hour": "0.004"}}}}}}"#).unwrap();

    let output = fbill(&[
        "--config",
        file.path().to_str().unwrap(),
        "--format",
        "json",
        "estimate",
    ]);
    assert!(output.status.success());
    assert_eq!(decimal(&json(&output)["breakdown"]["cpu_cost"]), dec!(2.88));
}

#[test]
fn test_efficiency_json() {
    let output = fbill(&[
        "--format",
        "json",
        "efficiency",
        "--cpu-usage",
        "500m",
        "--cpu-request",
        "1",
        "--memory-usage",
        "256Mi",
        "--memory-request",
        "512Mi",
    ]);
    assert!(output.status.success());

    let result = json(&output);
    assert_eq!(decimal(&result["cpu_efficiency"]), dec!(50));
    assert_eq!(decimal(&result["memory_efficiency"]), dec!(50));
    assert_eq!(decimal(&result["overall_efficiency"]), dec!(50));
}

#[test]
fn test_limits_cpu_over_starter_quota() {
    let output = fbill(&["--format", "json", "limits", "--cpu", "1500m", "--plan", "starter"]);
    assert!(!output.status.success(), "Exceeded quota should exit non-zero");

    let check = json(&output);
    assert_eq!(check["allowed"], false);
    assert_eq!(check["checks"]["cpu_limit"], false);
    assert_eq!(check["checks"]["memory_limit"], true);
}

#[test]
fn test_limits_within_professional_quota() {
    let output = fbill(&[
        "--format",
        "json",
        "limits",
        "--cpu",
        "1500m",
        "--memory",
        "1Gi",
        "--existing",
        "3",
        "--plan",
        "professional",
    ]);
    assert!(output.status.success());

    let check = json(&output);
    assert_eq!(check["allowed"], true);
    assert_eq!(check["current_usage"]["workloads_count"], 3);
}

#[test]
fn test_invalid_quantity() {
    let output = fbill(&["estimate", "--memory", "lots"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("invalid"), "Should explain the bad quantity");
}

#[test]
fn test_unknown_plan_tier() {
    let output = fbill(&["estimate", "--plan", "platinum"]);
    assert!(!output.status.success());
}

#[test]
fn test_missing_argument() {
    let output = fbill(&["limits"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("required") || stderr.contains("error"));
}
