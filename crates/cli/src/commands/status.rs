//! Controller status command

use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, ControllerStatus};
use crate::output::{color_action, color_status, format_timestamp, OutputFormat};

/// Row for the status table
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Last Action")]
    last_action: String,
    #[tabled(rename = "Cycles")]
    cycles: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Show the controller's current state and managed workload
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ControllerStatus = client.get("/status").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            let (workload, namespace, replicas) = match &status.workload {
                Some(w) => (w.name.clone(), w.namespace.clone(), w.replicas.to_string()),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };

            let row = StatusRow {
                state: color_status(&status.state),
                workload,
                namespace,
                replicas,
                last_action: status
                    .last_action
                    .as_deref()
                    .map(color_action)
                    .unwrap_or_else(|| "-".to_string()),
                cycles: status.cycles.to_string(),
                updated: format_timestamp(status.updated_at),
            };

            let table = Table::new([row]).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
