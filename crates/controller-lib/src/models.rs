//! Core data models for the replica controller

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute resources for one replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_millicores: u32,
    pub memory_bytes: u64,
}

/// Requests and limits for the workload's pod template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub requests: ResourceRequirements,
    pub limits: ResourceRequirements,
}

/// Creation input for a managed workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub container_image: String,
    pub replicas: u32,
    pub resources: ResourceSpec,
    pub template_labels: BTreeMap<String, String>,
}

/// The managed scalable unit, as reported by the orchestrator
///
/// `replicas` is only ever mutated through [`crate::orchestrator::Orchestrator::patch`],
/// which returns the new authoritative state. `generation` increases with
/// every accepted mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub container_image: String,
    pub resources: ResourceSpec,
    pub template_labels: BTreeMap<String, String>,
    pub generation: u64,
    pub created_at: i64,
}

/// Point-in-time usage observation for a single pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetric {
    pub pod_name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub timestamp: i64,
    pub cpu_usage_cores: f32,
    pub memory_usage_bytes: u64,
}

/// Point-in-time usage observation for a single node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetric {
    pub node_name: String,
    pub timestamp: i64,
    pub cpu_capacity_cores: f32,
    pub cpu_usage_cores: f32,
    pub memory_capacity_bytes: u64,
    pub memory_usage_bytes: u64,
}

/// One sampled set of cluster metrics, published by the producer and
/// consumed exactly once by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sequence: u64,
    pub captured_at: i64,
    pub pods: Vec<PodMetric>,
    pub nodes: Vec<NodeMetric>,
}

impl MetricsSnapshot {
    /// Pods belonging to `workload`: same namespace and every template
    /// label present on the pod with the same value.
    pub fn pods_owned_by(&self, workload: &Workload) -> Vec<PodMetric> {
        self.pods
            .iter()
            .filter(|pod| {
                pod.namespace == workload.namespace
                    && workload
                        .template_labels
                        .iter()
                        .all(|(k, v)| pod.labels.get(k) == Some(v))
            })
            .cloned()
            .collect()
    }
}
