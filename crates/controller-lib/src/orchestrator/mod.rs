//! Workload orchestrator client contract
//!
//! The control loop consumes this interface for everything it does against
//! the managed workload: lifecycle (create/read/patch/delete) and the
//! cluster metrics queries the producer samples from. A real deployment
//! would back it with the cluster API; [`InMemoryOrchestrator`] backs it
//! for local runs and tests.

mod memory;

pub use memory::InMemoryOrchestrator;

use crate::models::{NodeMetric, PodMetric, Workload, WorkloadSpec};
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors surfaced by orchestrator operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator API could not be reached or rejected the request
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    /// Create target already exists
    #[error("workload {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    /// Patch/read/delete target does not exist
    #[error("workload {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
}

impl OrchestratorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound { .. })
    }
}

/// Partial update applied by [`Orchestrator::patch`]; unset fields are
/// left unchanged
#[derive(Debug, Clone, Default)]
pub struct WorkloadPatch {
    pub replicas: Option<u32>,
    pub container_image: Option<String>,
}

impl WorkloadPatch {
    pub fn replicas(count: u32) -> Self {
        Self {
            replicas: Some(count),
            ..Self::default()
        }
    }
}

/// Client contract for the workload orchestrator
///
/// `patch` returns the new authoritative workload state, but read-after-write
/// consistency is not part of the contract; callers treat the returned value
/// as best-effort and may re-read.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create the managed workload from its spec
    async fn create(&self, spec: &WorkloadSpec) -> Result<Workload, OrchestratorError>;

    /// Read the current workload state
    async fn read(&self, name: &str, namespace: &str) -> Result<Workload, OrchestratorError>;

    /// Apply a partial update and return the new workload state
    async fn patch(
        &self,
        workload: &Workload,
        patch: &WorkloadPatch,
    ) -> Result<Workload, OrchestratorError>;

    /// Delete the workload
    async fn delete(&self, workload: &Workload) -> Result<(), OrchestratorError>;

    /// Sample metrics for all pods; an empty set is a valid result
    async fn query_pod_metrics(&self) -> Result<Vec<PodMetric>, OrchestratorError>;

    /// Sample metrics for all nodes; an empty set is a valid result
    async fn query_node_metrics(&self) -> Result<Vec<NodeMetric>, OrchestratorError>;
}
