//! Shared controller status for the local status endpoint

use super::policy::Action;
use super::ControllerState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Workload identity and replica count as last seen by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
}

/// Snapshot of the controller's externally visible state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<Action>,
    /// Completed decision cycles
    pub cycles: u64,
    pub updated_at: i64,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            state: ControllerState::Init,
            workload: None,
            last_action: None,
            cycles: 0,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Handle shared between the controller (writer) and the HTTP endpoint
/// (reader)
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<ControllerStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ControllerStatus {
        self.inner.read().await.clone()
    }

    pub(crate) async fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut ControllerStatus),
    {
        let mut status = self.inner.write().await;
        apply(&mut status);
        status.updated_at = chrono::Utc::now().timestamp();
    }
}
