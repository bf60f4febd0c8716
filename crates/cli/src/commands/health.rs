//! Health and metrics commands

use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, format_timestamp, print_warning, OutputFormat};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show component health and readiness
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("/healthz").await?;
    let readiness: ReadinessResponse = client.get("/readyz").await?;

    match format {
        OutputFormat::Json => {
            let combined = serde_json::json!({
                "health": health,
                "readiness": readiness,
            });
            println!("{}", serde_json::to_string_pretty(&combined)?);
        }
        OutputFormat::Table => {
            if health.components.is_empty() {
                print_warning("No components registered");
            } else {
                let mut rows: Vec<ComponentRow> = health
                    .components
                    .iter()
                    .map(|(name, component)| ComponentRow {
                        component: name.clone(),
                        status: color_status(&component.status),
                        message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                        last_check: format_timestamp(component.last_check_timestamp),
                    })
                    .collect();
                rows.sort_by(|a, b| a.component.cmp(&b.component));

                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{}", table);
            }

            println!(
                "Overall: {}  Ready: {}{}",
                color_status(&health.status),
                readiness.ready,
                readiness
                    .reason
                    .map(|reason| format!(" ({})", reason))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Dump the raw Prometheus exposition
pub async fn show_metrics(client: &ApiClient) -> Result<()> {
    let body = client.get_text("/metrics").await?;
    print!("{}", body);
    Ok(())
}
