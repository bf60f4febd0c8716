//! Scaleward controller - replica autoscaling control loop
//!
//! Runs the metrics producer and the decision controller against a managed
//! workload, serves the local status endpoint, and blocks until the
//! controller terminates.

use anyhow::{Context, Result};
use controller_lib::{
    health::components,
    mailbox::mailbox,
    observability::{LoopMetrics, StructuredLogger},
    DecisionController, HealthRegistry, InMemoryOrchestrator, MetricsProducer, ProducerConfig,
    RandomPolicy, ScalingPolicy, StatusHandle, UtilizationPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_policy(config: &config::AppConfig) -> Result<Box<dyn ScalingPolicy>> {
    match config.policy.as_str() {
        "random" => Ok(match config.policy_seed {
            Some(seed) => Box::new(RandomPolicy::with_seed(seed)),
            None => Box::new(RandomPolicy::new()),
        }),
        "utilization" => Ok(Box::new(UtilizationPolicy::new(
            config.cpu_high_watermark_percent,
            config.cpu_low_watermark_percent,
        ))),
        other => anyhow::bail!("unknown policy {other:?}, expected \"random\" or \"utilization\""),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting scale-controller");

    // Load configuration
    let config = config::AppConfig::load()?;
    info!(
        workload = %config.workload_name,
        namespace = %config.workload_namespace,
        policy = %config.policy,
        "Controller configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::PRODUCER).await;
    health_registry.register(components::CONTROLLER).await;
    health_registry.register(components::ORCHESTRATOR).await;

    // Initialize metrics and structured logger
    let _metrics = LoopMetrics::new();
    let logger = StructuredLogger::new(&config.workload_name);
    logger.log_startup(CONTROLLER_VERSION, &config.policy);

    // Wire the actors: orchestrator, mailbox, producer, controller
    let orchestrator = Arc::new(InMemoryOrchestrator::new());
    let (snapshot_tx, snapshot_rx) = mailbox();

    let producer = MetricsProducer::new(
        orchestrator.clone(),
        snapshot_tx,
        ProducerConfig {
            interval: Duration::from_secs(config.producer_interval_secs),
        },
        health_registry.clone(),
    );

    let status = StatusHandle::new();
    let controller = DecisionController::builder()
        .orchestrator(orchestrator)
        .mailbox(snapshot_rx)
        .policy(build_policy(&config)?)
        .workload_spec(config.workload_spec())
        .receive_timeout(Duration::from_secs(config.receive_timeout_secs))
        .health(health_registry.clone())
        .status(status.clone())
        .build()
        .context("Failed to build decision controller")?;

    // Start the status endpoint
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), status));
    tokio::spawn(api::serve(config.api_port, app_state));

    // Shutdown propagation: Ctrl-C stops both actors
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    tokio::spawn(producer.run(shutdown_tx.subscribe()));
    let controller_handle = tokio::spawn(controller.run(shutdown_tx.subscribe()));

    {
        let shutdown_tx = shutdown_tx.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                logger.log_shutdown("SIGINT received");
                let _ = shutdown_tx.send(());
            }
        });
    }

    // Block until the controller reaches its terminal state
    let result = controller_handle
        .await
        .context("Decision controller task panicked")?;
    // stop the producer if it is still ticking
    let _ = shutdown_tx.send(());

    if let Err(error) = &result {
        logger.log_fatal(&error.to_string());
    } else {
        info!("Controller terminated cleanly");
    }

    result.context("Control loop failed")?;
    Ok(())
}
