//! Scaleward CLI
//!
//! A command-line tool for inspecting a running replica controller through
//! its local status endpoint.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, status};

/// Scaleward replica controller CLI
#[derive(Parser)]
#[command(name = "swctl")]
#[command(author, version, about = "CLI for the Scaleward replica controller", long_about = None)]
pub struct Cli {
    /// Controller endpoint URL (can also be set via SWCTL_API_URL env var)
    #[arg(long, env = "SWCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show controller state, managed workload and last decision
    Status,

    /// Show component health and readiness
    Health,

    /// Dump the raw Prometheus metrics exposition
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Metrics => {
            health::show_metrics(&client).await?;
        }
    }

    Ok(())
}
