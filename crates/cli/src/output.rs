//! Output formatting utilities

use billing_lib::Degradation;
use clap::ValueEnum;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a rounded table; `empty` is shown instead when there are no rows
pub fn print_table<T: Tabled>(rows: Vec<T>, empty: &str) {
    if rows.is_empty() {
        println!("{}", empty.yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// One warning line per degradation
pub fn print_degradations(reasons: &[Degradation]) {
    for reason in reasons {
        let text = match reason {
            Degradation::TariffUnavailable(detail) => format!("tariff store unavailable ({detail}), fallback rates used"),
            Degradation::FallbackRates(fields) => format!("plan lacks {}, fallback rates used", fields.join(", ")),
            Degradation::MetricsUnavailable(detail) => format!("metrics unavailable: {detail}"),
            Degradation::CacheUnavailable(detail) => format!("cost cache unavailable: {detail}"),
            Degradation::UsageUnavailable(detail) => format!("current usage unknown: {detail}"),
        };
        print_warning(&text);
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 && millicores % 100 == 0 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Dollars with the four places money is kept at
pub fn format_currency(amount: Decimal) -> String {
    format!("${:.4}", amount)
}

pub fn format_percent(value: Decimal) -> String {
    format!("{:.2}%", value)
}

/// Green for a passed check, red otherwise
pub fn color_check(passed: bool) -> String {
    if passed {
        "ok".green().to_string()
    } else {
        "exceeded".red().to_string()
    }
}

/// Color an efficiency percentage by band
pub fn color_efficiency(efficiency: Decimal) -> String {
    let formatted = format_percent(efficiency);
    if efficiency >= Decimal::from(70) {
        formatted.green().to_string()
    } else if efficiency >= Decimal::from(40) {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512.00Mi");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.50Gi");
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(250), "250m");
        assert_eq!(format_cpu(1500), "1.5");
        assert_eq!(format_cpu(1250), "1250m");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(2.925)), "$2.9250");
        assert_eq!(format_currency(dec!(0.0039)), "$0.0039");
    }
}
