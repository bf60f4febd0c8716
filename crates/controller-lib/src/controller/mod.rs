//! Decision controller state machine
//!
//! Drives the control loop one transition at a time: acquire the workload,
//! wait for a snapshot, decide, act, repeat until termination. All mutable
//! cycle state (workload, filtered metrics, live action) is owned by the
//! controller instance and threaded through the transitions; nothing is
//! ambient.

pub mod policy;
pub mod status;

#[cfg(test)]
mod tests;

pub use policy::{
    action_for_draw, Action, PolicyError, RandomPolicy, ScalingPolicy, UtilizationPolicy,
    MAX_REPLICAS, MIN_REPLICAS,
};
pub use status::{ControllerStatus, StatusHandle, WorkloadStatus};

use crate::health::{components, HealthRegistry};
use crate::mailbox::MailboxReceiver;
use crate::models::{NodeMetric, PodMetric, Workload, WorkloadSpec};
use crate::observability::LoopMetrics;
use crate::orchestrator::{Orchestrator, OrchestratorError, WorkloadPatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Controller state; exactly one instance owns this value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Init,
    Collect,
    Decide,
    Act,
    Terminated,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Init => "init",
            ControllerState::Collect => "collect",
            ControllerState::Decide => "decide",
            ControllerState::Act => "act",
            ControllerState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal control-loop errors; receive timeouts are flow control and never
/// appear here
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("orchestrator request failed during {phase}: {source}")]
    Orchestrator {
        phase: &'static str,
        #[source]
        source: OrchestratorError,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Tunables of the state machine itself
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Bounded wait in COLLECT before self-looping
    pub receive_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(10),
        }
    }
}

enum CollectEvent {
    Stepped(Result<ControllerState, ControllerError>),
    Shutdown,
}

/// The finite-state decision controller
pub struct DecisionController {
    orchestrator: Arc<dyn Orchestrator>,
    mailbox: MailboxReceiver,
    policy: Box<dyn ScalingPolicy>,
    spec: WorkloadSpec,
    config: ControllerConfig,
    health: HealthRegistry,
    status: StatusHandle,
    metrics: LoopMetrics,
    state: ControllerState,
    workload: Option<Workload>,
    pods: Vec<PodMetric>,
    nodes: Vec<NodeMetric>,
    action: Option<Action>,
    last_action: Option<Action>,
    cycles: u64,
}

impl DecisionController {
    pub fn builder() -> DecisionControllerBuilder {
        DecisionControllerBuilder::new()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn workload(&self) -> Option<&Workload> {
        self.workload.as_ref()
    }

    /// Name of the injected decision policy
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Run the state machine to termination
    ///
    /// A shutdown signal received while waiting in COLLECT forces
    /// [`Action::Finish`], which tears the workload down through the normal
    /// ACT path. Orchestrator and policy failures are fatal: cleanup is
    /// attempted and the error is surfaced to the caller.
    pub async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ControllerError> {
        self.health.set_healthy(components::CONTROLLER).await;

        loop {
            if self.state == ControllerState::Terminated {
                return Ok(());
            }

            let stepped = if self.state == ControllerState::Collect {
                let event = tokio::select! {
                    next = self.on_collect() => CollectEvent::Stepped(next),
                    _ = shutdown.recv() => CollectEvent::Shutdown,
                };
                match event {
                    CollectEvent::Stepped(next) => next,
                    CollectEvent::Shutdown => {
                        info!("shutdown requested, finishing control loop");
                        self.action = Some(Action::Finish);
                        self.last_action = Some(Action::Finish);
                        Ok(ControllerState::Act)
                    }
                }
            } else {
                self.dispatch().await
            };

            let next = match stepped {
                Ok(next) => next,
                Err(error) => return Err(self.fail(error).await),
            };
            if let Err(error) = self.advance(next).await {
                return Err(self.fail(error).await);
            }
        }
    }

    /// Perform exactly one state transition
    ///
    /// After termination this is a warn-logged no-op.
    pub async fn step(&mut self) -> Result<ControllerState, ControllerError> {
        if self.state == ControllerState::Terminated {
            warn!("step ignored: controller already terminated");
            return Ok(ControllerState::Terminated);
        }
        let next = self.dispatch().await?;
        self.advance(next).await?;
        Ok(self.state)
    }

    async fn dispatch(&mut self) -> Result<ControllerState, ControllerError> {
        match self.state {
            ControllerState::Init => self.on_init().await,
            ControllerState::Collect => self.on_collect().await,
            ControllerState::Decide => self.on_decide(),
            ControllerState::Act => self.on_act().await,
            ControllerState::Terminated => Ok(ControllerState::Terminated),
        }
    }

    async fn on_init(&mut self) -> Result<ControllerState, ControllerError> {
        info!(
            workload = %self.spec.name,
            namespace = %self.spec.namespace,
            replicas = self.spec.replicas,
            image = %self.spec.container_image,
            "creating managed workload"
        );

        let started = Instant::now();
        let result = self.orchestrator.create(&self.spec).await;
        let created = self.record_call("init", started, result).await?;

        self.metrics.set_current_replicas(created.replicas as i64);
        self.workload = Some(created);
        self.health.set_ready(true).await;
        Ok(ControllerState::Collect)
    }

    async fn on_collect(&mut self) -> Result<ControllerState, ControllerError> {
        match self.mailbox.recv(self.config.receive_timeout).await {
            Some(snapshot) => {
                let workload = self
                    .workload
                    .as_ref()
                    .expect("workload exists after INIT");
                let owned = snapshot.pods_owned_by(workload);
                debug!(
                    sequence = snapshot.sequence,
                    pods_total = snapshot.pods.len(),
                    pods_owned = owned.len(),
                    nodes = snapshot.nodes.len(),
                    "snapshot received"
                );
                self.pods = owned;
                self.nodes = snapshot.nodes;
                Ok(ControllerState::Decide)
            }
            None => {
                // normal flow control, not an error
                self.metrics.inc_receive_timeouts();
                debug!(
                    timeout_secs = self.config.receive_timeout.as_secs(),
                    "no snapshot within timeout"
                );
                Ok(ControllerState::Collect)
            }
        }
    }

    fn on_decide(&mut self) -> Result<ControllerState, ControllerError> {
        let workload = self
            .workload
            .as_ref()
            .expect("workload exists after INIT");

        let action = self.policy.decide(workload, &self.pods, &self.nodes)?;
        self.cycles += 1;
        self.metrics.inc_decision(action.as_str());
        info!(
            action = %action,
            policy = %self.policy.name(),
            replicas = workload.replicas,
            pods = self.pods.len(),
            cycle = self.cycles,
            "decision computed"
        );

        self.action = Some(action);
        self.last_action = Some(action);
        Ok(if action == Action::Keep {
            ControllerState::Collect
        } else {
            ControllerState::Act
        })
    }

    async fn on_act(&mut self) -> Result<ControllerState, ControllerError> {
        let Some(action) = self.action.take() else {
            warn!("ACT entered without a pending action");
            return Ok(ControllerState::Collect);
        };

        match action {
            Action::Finish => Ok(ControllerState::Terminated),
            Action::Keep => {
                warn!("ACT entered with a keep action");
                Ok(ControllerState::Collect)
            }
            Action::Increase | Action::Decrease => {
                let workload = self
                    .workload
                    .clone()
                    .expect("workload exists after INIT");
                let target = match action {
                    Action::Increase => (workload.replicas + 1).min(MAX_REPLICAS),
                    _ => workload.replicas.saturating_sub(1).max(MIN_REPLICAS),
                };

                let started = Instant::now();
                let result = self
                    .orchestrator
                    .patch(&workload, &WorkloadPatch::replicas(target))
                    .await;
                let patched = self.record_call("act", started, result).await?;

                info!(
                    workload = %patched.name,
                    old_replicas = workload.replicas,
                    new_replicas = patched.replicas,
                    "replica count adjusted"
                );
                self.metrics.inc_scale_operation(match action {
                    Action::Increase => "up",
                    _ => "down",
                });
                self.metrics.set_current_replicas(patched.replicas as i64);
                self.workload = Some(patched);
                Ok(ControllerState::Collect)
            }
        }
    }

    /// Delete the workload; runs exactly once, on entering TERMINATED
    async fn on_terminated(&mut self) -> Result<(), ControllerError> {
        self.health.set_ready(false).await;
        let Some(workload) = self.workload.take() else {
            return Ok(());
        };

        info!(workload = %workload.name, namespace = %workload.namespace, "deleting managed workload");
        let started = Instant::now();
        let result = self.orchestrator.delete(&workload).await;
        self.metrics
            .observe_orchestrator_latency(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.health.set_healthy(components::ORCHESTRATOR).await;
                Ok(())
            }
            // already gone counts as satisfied
            Err(error) if error.is_not_found() => {
                debug!(workload = %workload.name, "workload already absent");
                Ok(())
            }
            Err(source) => {
                self.health
                    .set_unhealthy(components::ORCHESTRATOR, source.to_string())
                    .await;
                Err(ControllerError::Orchestrator {
                    phase: "terminate",
                    source,
                })
            }
        }
    }

    async fn advance(&mut self, next: ControllerState) -> Result<(), ControllerError> {
        let prev = self.state;
        self.state = next;
        self.metrics.inc_state_transitions();
        self.metrics.set_controller_state(next.as_str());
        if prev == next {
            debug!(state = %next, "state self-loop");
        } else {
            info!(from = %prev, to = %next, "state transition");
        }

        let workload = self.workload.as_ref().map(|w| WorkloadStatus {
            name: w.name.clone(),
            namespace: w.namespace.clone(),
            replicas: w.replicas,
        });
        let last_action = self.last_action;
        let cycles = self.cycles;
        self.status
            .update(|status| {
                status.state = next;
                status.workload = workload;
                status.last_action = last_action;
                status.cycles = cycles;
            })
            .await;

        if next == ControllerState::Terminated {
            self.on_terminated().await?;
        }
        Ok(())
    }

    /// Fatal path: best-effort cleanup, mark terminated, hand the error back
    async fn fail(&mut self, error: ControllerError) -> ControllerError {
        warn!(error = %error, "fatal controller error, attempting cleanup");
        self.health
            .set_unhealthy(components::CONTROLLER, error.to_string())
            .await;
        self.health.set_ready(false).await;

        if let Some(workload) = self.workload.take() {
            match self.orchestrator.delete(&workload).await {
                Ok(()) => info!(workload = %workload.name, "cleanup delete succeeded"),
                Err(cleanup) if cleanup.is_not_found() => {}
                Err(cleanup) => warn!(error = %cleanup, "cleanup delete failed"),
            }
        }

        self.state = ControllerState::Terminated;
        self.metrics.set_controller_state("terminated");
        self.status
            .update(|status| status.state = ControllerState::Terminated)
            .await;
        error
    }

    async fn record_call<T>(
        &self,
        phase: &'static str,
        started: Instant,
        result: Result<T, OrchestratorError>,
    ) -> Result<T, ControllerError> {
        self.metrics
            .observe_orchestrator_latency(started.elapsed().as_secs_f64());
        match result {
            Ok(value) => {
                self.health.set_healthy(components::ORCHESTRATOR).await;
                Ok(value)
            }
            Err(source) => {
                self.health
                    .set_unhealthy(components::ORCHESTRATOR, source.to_string())
                    .await;
                Err(ControllerError::Orchestrator { phase, source })
            }
        }
    }
}

/// Builder for the decision controller
pub struct DecisionControllerBuilder {
    orchestrator: Option<Arc<dyn Orchestrator>>,
    mailbox: Option<MailboxReceiver>,
    policy: Option<Box<dyn ScalingPolicy>>,
    spec: Option<WorkloadSpec>,
    config: ControllerConfig,
    health: HealthRegistry,
    status: StatusHandle,
}

impl DecisionControllerBuilder {
    pub fn new() -> Self {
        Self {
            orchestrator: None,
            mailbox: None,
            policy: None,
            spec: None,
            config: ControllerConfig::default(),
            health: HealthRegistry::new(),
            status: StatusHandle::new(),
        }
    }

    pub fn orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn mailbox(mut self, mailbox: MailboxReceiver) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn policy(mut self, policy: Box<dyn ScalingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn workload_spec(mut self, spec: WorkloadSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn status(mut self, status: StatusHandle) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> anyhow::Result<DecisionController> {
        let orchestrator = self
            .orchestrator
            .ok_or_else(|| anyhow::anyhow!("Orchestrator is required"))?;
        let mailbox = self
            .mailbox
            .ok_or_else(|| anyhow::anyhow!("Mailbox receiver is required"))?;
        let policy = self
            .policy
            .ok_or_else(|| anyhow::anyhow!("Scaling policy is required"))?;
        let spec = self
            .spec
            .ok_or_else(|| anyhow::anyhow!("Workload spec is required"))?;

        Ok(DecisionController {
            orchestrator,
            mailbox,
            policy,
            spec,
            config: self.config,
            health: self.health,
            status: self.status,
            metrics: LoopMetrics::new(),
            state: ControllerState::Init,
            workload: None,
            pods: Vec::new(),
            nodes: Vec::new(),
            action: None,
            last_action: None,
            cycles: 0,
        })
    }
}

impl Default for DecisionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
