//! Periodic metrics producer
//!
//! Samples cluster-wide pod and node metrics on a fixed period and
//! publishes a snapshot to the controller mailbox. Delivery is
//! fire-and-forget: a failed query skips the tick, and an unread snapshot
//! is simply superseded by the next one.

use crate::health::{components, HealthRegistry};
use crate::mailbox::MailboxSender;
use crate::models::MetricsSnapshot;
use crate::observability::LoopMetrics;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Configuration for the metrics producer
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Sampling period (default: 2 seconds)
    pub interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

/// Periodic actor publishing metrics snapshots to the controller
pub struct MetricsProducer {
    orchestrator: Arc<dyn Orchestrator>,
    mailbox: MailboxSender,
    config: ProducerConfig,
    health: HealthRegistry,
    metrics: LoopMetrics,
    sequence: u64,
}

impl MetricsProducer {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        mailbox: MailboxSender,
        config: ProducerConfig,
        health: HealthRegistry,
    ) -> Self {
        Self {
            orchestrator,
            mailbox,
            config,
            health,
            metrics: LoopMetrics::new(),
            sequence: 0,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "starting metrics producer"
        );

        let mut ticker = interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("shutting down metrics producer");
                    break;
                }
            }
        }
    }

    /// Sample and publish one snapshot; a failed query skips the tick
    async fn tick(&mut self) {
        let pods = match self.orchestrator.query_pod_metrics().await {
            Ok(pods) => pods,
            Err(error) => {
                self.skip_tick(&error.to_string()).await;
                return;
            }
        };
        let nodes = match self.orchestrator.query_node_metrics().await {
            Ok(nodes) => nodes,
            Err(error) => {
                self.skip_tick(&error.to_string()).await;
                return;
            }
        };

        self.sequence += 1;
        let snapshot = MetricsSnapshot {
            sequence: self.sequence,
            captured_at: chrono::Utc::now().timestamp(),
            pods,
            nodes,
        };

        debug!(
            sequence = snapshot.sequence,
            pods = snapshot.pods.len(),
            nodes = snapshot.nodes.len(),
            "publishing snapshot"
        );
        if let Some(superseded) = self.mailbox.send(snapshot) {
            debug!(
                sequence = superseded.sequence,
                "unread snapshot superseded"
            );
        }
        self.metrics.inc_snapshots_published();
        self.health.set_healthy(components::PRODUCER).await;
    }

    async fn skip_tick(&self, reason: &str) {
        warn!(error = %reason, "metrics query failed, skipping tick");
        self.metrics.inc_producer_tick_errors();
        self.health
            .set_degraded(components::PRODUCER, reason.to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;
    use crate::models::{NodeMetric, PodMetric, Workload, WorkloadSpec};
    use crate::models::{ResourceRequirements, ResourceSpec};
    use crate::orchestrator::{
        async_trait, InMemoryOrchestrator, OrchestratorError, WorkloadPatch,
    };
    use std::collections::BTreeMap;

    fn demo_spec(name: &str, replicas: u32) -> WorkloadSpec {
        WorkloadSpec {
            name: name.to_string(),
            namespace: "default".to_string(),
            container_image: "nginx:1.25".to_string(),
            replicas,
            resources: ResourceSpec {
                requests: ResourceRequirements {
                    cpu_millicores: 250,
                    memory_bytes: 128 << 20,
                },
                limits: ResourceRequirements {
                    cpu_millicores: 500,
                    memory_bytes: 256 << 20,
                },
            },
            template_labels: BTreeMap::from([("app".to_string(), name.to_string())]),
        }
    }

    /// Orchestrator whose metrics endpoints always fail
    struct UnreachableOrchestrator;

    #[async_trait]
    impl Orchestrator for UnreachableOrchestrator {
        async fn create(&self, _spec: &WorkloadSpec) -> Result<Workload, OrchestratorError> {
            Err(OrchestratorError::Unavailable("offline".to_string()))
        }

        async fn read(&self, name: &str, namespace: &str) -> Result<Workload, OrchestratorError> {
            Err(OrchestratorError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
        }

        async fn patch(
            &self,
            _workload: &Workload,
            _patch: &WorkloadPatch,
        ) -> Result<Workload, OrchestratorError> {
            Err(OrchestratorError::Unavailable("offline".to_string()))
        }

        async fn delete(&self, _workload: &Workload) -> Result<(), OrchestratorError> {
            Err(OrchestratorError::Unavailable("offline".to_string()))
        }

        async fn query_pod_metrics(&self) -> Result<Vec<PodMetric>, OrchestratorError> {
            Err(OrchestratorError::Unavailable("offline".to_string()))
        }

        async fn query_node_metrics(&self) -> Result<Vec<NodeMetric>, OrchestratorError> {
            Err(OrchestratorError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn tick_publishes_a_snapshot() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(1));
        orchestrator.create(&demo_spec("web", 2)).await.unwrap();

        let (tx, mut rx) = mailbox();
        let mut producer = MetricsProducer::new(
            orchestrator,
            tx,
            ProducerConfig::default(),
            HealthRegistry::new(),
        );

        producer.tick().await;
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.pods.len(), 2);

        producer.tick().await;
        assert_eq!(rx.try_recv().unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn failed_query_skips_tick_without_publishing() {
        let (tx, mut rx) = mailbox();
        let health = HealthRegistry::new();
        let mut producer = MetricsProducer::new(
            Arc::new(UnreachableOrchestrator),
            tx,
            ProducerConfig::default(),
            health.clone(),
        );

        producer.tick().await;
        assert!(rx.try_recv().is_none());

        let response = health.health().await;
        assert_eq!(
            response.components[components::PRODUCER].status,
            crate::health::ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(1));
        let (tx, _rx) = mailbox();
        let producer = MetricsProducer::new(
            orchestrator,
            tx,
            ProducerConfig {
                interval: Duration::from_millis(10),
            },
            HealthRegistry::new(),
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(producer.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
