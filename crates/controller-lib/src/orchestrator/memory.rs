//! In-memory orchestrator simulation
//!
//! Keeps workloads in a shared map and synthesizes one pod metric per
//! replica plus a small fixed node inventory, so the whole control loop can
//! run and be tested without a cluster. Replica counts are validated against
//! the same bounds the controller enforces.

use super::{Orchestrator, OrchestratorError, WorkloadPatch};
use crate::controller::policy::{MAX_REPLICAS, MIN_REPLICAS};
use crate::models::{NodeMetric, PodMetric, Workload, WorkloadSpec};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

const NODE_COUNT: usize = 2;
const NODE_CPU_CORES: f32 = 8.0;
const NODE_MEMORY_BYTES: u64 = 32 << 30;

/// Simulation backend for the [`Orchestrator`] contract
pub struct InMemoryOrchestrator {
    workloads: RwLock<HashMap<String, Workload>>,
    rng: Mutex<StdRng>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self {
            workloads: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            workloads: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn validate_replicas(replicas: u32) -> Result<(), OrchestratorError> {
        if !(MIN_REPLICAS..=MAX_REPLICAS).contains(&replicas) {
            return Err(OrchestratorError::Unavailable(format!(
                "replica count {} outside [{}, {}]",
                replicas, MIN_REPLICAS, MAX_REPLICAS
            )));
        }
        Ok(())
    }

    fn usage_noise(&self) -> f32 {
        self.rng.lock().expect("rng lock poisoned").gen_range(0.5..1.0)
    }
}

impl Default for InMemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn create(&self, spec: &WorkloadSpec) -> Result<Workload, OrchestratorError> {
        Self::validate_replicas(spec.replicas)?;

        let mut workloads = self.workloads.write().await;
        let k = key(&spec.namespace, &spec.name);
        if workloads.contains_key(&k) {
            return Err(OrchestratorError::AlreadyExists {
                namespace: spec.namespace.clone(),
                name: spec.name.clone(),
            });
        }

        let workload = Workload {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
            replicas: spec.replicas,
            container_image: spec.container_image.clone(),
            resources: spec.resources,
            template_labels: spec.template_labels.clone(),
            generation: 1,
            created_at: chrono::Utc::now().timestamp(),
        };
        debug!(workload = %k, replicas = workload.replicas, "created workload");
        workloads.insert(k, workload.clone());
        Ok(workload)
    }

    async fn read(&self, name: &str, namespace: &str) -> Result<Workload, OrchestratorError> {
        let workloads = self.workloads.read().await;
        workloads
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn patch(
        &self,
        workload: &Workload,
        patch: &WorkloadPatch,
    ) -> Result<Workload, OrchestratorError> {
        if let Some(replicas) = patch.replicas {
            Self::validate_replicas(replicas)?;
        }

        let mut workloads = self.workloads.write().await;
        let k = key(&workload.namespace, &workload.name);
        let stored = workloads
            .get_mut(&k)
            .ok_or_else(|| OrchestratorError::NotFound {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
            })?;

        if let Some(replicas) = patch.replicas {
            stored.replicas = replicas;
        }
        if let Some(image) = &patch.container_image {
            stored.container_image = image.clone();
        }
        stored.generation += 1;
        debug!(workload = %k, replicas = stored.replicas, generation = stored.generation, "patched workload");
        Ok(stored.clone())
    }

    async fn delete(&self, workload: &Workload) -> Result<(), OrchestratorError> {
        let mut workloads = self.workloads.write().await;
        let k = key(&workload.namespace, &workload.name);
        if workloads.remove(&k).is_none() {
            return Err(OrchestratorError::NotFound {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
            });
        }
        debug!(workload = %k, "deleted workload");
        Ok(())
    }

    async fn query_pod_metrics(&self) -> Result<Vec<PodMetric>, OrchestratorError> {
        let workloads = self.workloads.read().await;
        let now = chrono::Utc::now().timestamp();

        let mut pods = Vec::new();
        for workload in workloads.values() {
            let requested_cores = workload.resources.requests.cpu_millicores as f32 / 1000.0;
            for ordinal in 0..workload.replicas {
                pods.push(PodMetric {
                    pod_name: format!("{}-{}", workload.name, ordinal),
                    namespace: workload.namespace.clone(),
                    labels: workload.template_labels.clone(),
                    timestamp: now,
                    cpu_usage_cores: requested_cores * self.usage_noise(),
                    memory_usage_bytes: (workload.resources.requests.memory_bytes as f32
                        * self.usage_noise()) as u64,
                });
            }
        }
        Ok(pods)
    }

    async fn query_node_metrics(&self) -> Result<Vec<NodeMetric>, OrchestratorError> {
        let now = chrono::Utc::now().timestamp();
        let nodes = (0..NODE_COUNT)
            .map(|ordinal| NodeMetric {
                node_name: format!("node-{}", ordinal),
                timestamp: now,
                cpu_capacity_cores: NODE_CPU_CORES,
                cpu_usage_cores: NODE_CPU_CORES * self.usage_noise() * 0.5,
                memory_capacity_bytes: NODE_MEMORY_BYTES,
                memory_usage_bytes: (NODE_MEMORY_BYTES as f32 * self.usage_noise() * 0.5) as u64,
            })
            .collect();
        Ok(nodes)
    }
}
