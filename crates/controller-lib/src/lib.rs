//! Controller library for the replica autoscaling loop
//!
//! This crate provides the core functionality for:
//! - The decision controller state machine
//! - Scaling policies (random reference policy, CPU utilization)
//! - The periodic metrics producer
//! - The single-slot snapshot mailbox
//! - The workload orchestrator contract and its in-memory backend
//! - Health checks and observability

pub mod controller;
pub mod health;
pub mod mailbox;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod producer;

pub use controller::{
    Action, ControllerError, ControllerState, ControllerStatus, DecisionController,
    DecisionControllerBuilder, PolicyError, RandomPolicy, ScalingPolicy, StatusHandle,
    UtilizationPolicy, MAX_REPLICAS, MIN_REPLICAS,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
pub use models::*;
pub use observability::{LoopMetrics, StructuredLogger};
pub use orchestrator::{InMemoryOrchestrator, Orchestrator, OrchestratorError, WorkloadPatch};
pub use producer::{MetricsProducer, ProducerConfig};
