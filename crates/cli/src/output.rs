//! Output formatting utilities

use chrono::{TimeZone, Utc};
use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print an error message
#[allow(dead_code)]
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Render an epoch timestamp as UTC
pub fn format_timestamp(epoch_secs: i64) -> String {
    match Utc.timestamp_opt(epoch_secs, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => epoch_secs.to_string(),
    }
}

/// Color a controller state or health status by severity
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "collect" | "decide" | "act" => status.green().to_string(),
        "degraded" | "init" => status.yellow().to_string(),
        "unhealthy" | "terminated" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a scaling action
pub fn color_action(action: &str) -> String {
    match action.to_lowercase().as_str() {
        "increase" => action.green().to_string(),
        "decrease" => action.yellow().to_string(),
        "finish" => action.red().to_string(),
        _ => action.to_string(),
    }
}
