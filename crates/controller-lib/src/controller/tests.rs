//! State machine scenario tests

use super::policy::{action_for_draw, Action, PolicyError, ScalingPolicy};
use super::{ControllerState, DecisionController};
use crate::health::HealthRegistry;
use crate::mailbox::{mailbox, MailboxSender};
use crate::models::{
    MetricsSnapshot, NodeMetric, PodMetric, ResourceRequirements, ResourceSpec, Workload,
    WorkloadSpec,
};
use crate::orchestrator::{
    async_trait, InMemoryOrchestrator, Orchestrator, OrchestratorError, WorkloadPatch,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Policy evaluating the reference draw mapping with a fixed draw
struct ForcedDrawPolicy {
    draw: u32,
}

impl ScalingPolicy for ForcedDrawPolicy {
    fn name(&self) -> &str {
        "forced-draw"
    }

    fn decide(
        &self,
        workload: &Workload,
        _pods: &[PodMetric],
        _nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError> {
        Ok(action_for_draw(self.draw, workload.replicas))
    }
}

/// Policy replaying a fixed action script, then keeping
struct ScriptedPolicy {
    script: Mutex<VecDeque<Action>>,
}

impl ScriptedPolicy {
    fn new(actions: &[Action]) -> Self {
        Self {
            script: Mutex::new(actions.iter().copied().collect()),
        }
    }
}

impl ScalingPolicy for ScriptedPolicy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decide(
        &self,
        _workload: &Workload,
        _pods: &[PodMetric],
        _nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError> {
        Ok(self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Action::Keep))
    }
}

struct FailingPolicy;

impl ScalingPolicy for FailingPolicy {
    fn name(&self) -> &str {
        "failing"
    }

    fn decide(
        &self,
        _workload: &Workload,
        _pods: &[PodMetric],
        _nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError> {
        Err(PolicyError("synthetic failure".to_string()))
    }
}

/// Wrapper around the in-memory backend that counts deletes and can be
/// told to fail patches
struct CountingOrchestrator {
    inner: InMemoryOrchestrator,
    deletes: AtomicUsize,
    fail_patch: bool,
}

impl CountingOrchestrator {
    fn new() -> Self {
        Self {
            inner: InMemoryOrchestrator::with_seed(11),
            deletes: AtomicUsize::new(0),
            fail_patch: false,
        }
    }

    fn failing_patch() -> Self {
        Self {
            fail_patch: true,
            ..Self::new()
        }
    }

    fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for CountingOrchestrator {
    async fn create(&self, spec: &WorkloadSpec) -> Result<Workload, OrchestratorError> {
        self.inner.create(spec).await
    }

    async fn read(&self, name: &str, namespace: &str) -> Result<Workload, OrchestratorError> {
        self.inner.read(name, namespace).await
    }

    async fn patch(
        &self,
        workload: &Workload,
        patch: &WorkloadPatch,
    ) -> Result<Workload, OrchestratorError> {
        if self.fail_patch {
            return Err(OrchestratorError::Unavailable(
                "synthetic patch failure".to_string(),
            ));
        }
        self.inner.patch(workload, patch).await
    }

    async fn delete(&self, workload: &Workload) -> Result<(), OrchestratorError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(workload).await
    }

    async fn query_pod_metrics(&self) -> Result<Vec<PodMetric>, OrchestratorError> {
        self.inner.query_pod_metrics().await
    }

    async fn query_node_metrics(&self) -> Result<Vec<NodeMetric>, OrchestratorError> {
        self.inner.query_node_metrics().await
    }
}

fn spec(replicas: u32) -> WorkloadSpec {
    WorkloadSpec {
        name: "web".to_string(),
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
        template_labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
    }
}

fn empty_snapshot(sequence: u64) -> MetricsSnapshot {
    MetricsSnapshot {
        sequence,
        captured_at: 0,
        pods: vec![],
        nodes: vec![],
    }
}

fn controller_with(
    orchestrator: Arc<dyn Orchestrator>,
    policy: Box<dyn ScalingPolicy>,
    replicas: u32,
    receive_timeout: Duration,
) -> (DecisionController, MailboxSender) {
    let (tx, rx) = mailbox();
    let controller = DecisionController::builder()
        .orchestrator(orchestrator)
        .mailbox(rx)
        .policy(policy)
        .workload_spec(spec(replicas))
        .receive_timeout(receive_timeout)
        .health(HealthRegistry::new())
        .build()
        .expect("controller builds");
    (controller, tx)
}

#[tokio::test]
async fn scenario_a_keep_leaves_single_replica_untouched() {
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 50 }),
        1,
        Duration::from_millis(100),
    );

    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);
    assert_eq!(controller.workload().unwrap().replicas, 1);

    // snapshot with zero pods for this workload
    tx.send(empty_snapshot(1));
    assert_eq!(controller.step().await.unwrap(), ControllerState::Decide);
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);

    assert_eq!(controller.workload().unwrap().replicas, 1);
    assert_eq!(orchestrator.read("web", "default").await.unwrap().replicas, 1);
}

#[tokio::test]
async fn scenario_b_increase_patches_five_to_six() {
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 80 }),
        5,
        Duration::from_millis(100),
    );

    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);
    tx.send(empty_snapshot(1));
    assert_eq!(controller.step().await.unwrap(), ControllerState::Decide);
    assert_eq!(controller.step().await.unwrap(), ControllerState::Act);
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);

    assert_eq!(controller.workload().unwrap().replicas, 6);
    assert_eq!(orchestrator.read("web", "default").await.unwrap().replicas, 6);
}

#[tokio::test]
async fn scenario_c_decrease_draw_at_min_replicas_keeps() {
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 10 }),
        1,
        Duration::from_millis(100),
    );

    controller.step().await.unwrap();
    tx.send(empty_snapshot(1));
    assert_eq!(controller.step().await.unwrap(), ControllerState::Decide);
    // guard turns the decrease draw into keep, so DECIDE loops to COLLECT
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);
    assert_eq!(controller.workload().unwrap().replicas, 1);
}

#[tokio::test]
async fn collect_timeout_self_loops_without_mutation() {
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, _tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 50 }),
        3,
        Duration::from_millis(20),
    );

    controller.step().await.unwrap();
    let before = controller.workload().unwrap().clone();

    // nothing sent: the bounded receive expires
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);

    let after = controller.workload().unwrap();
    assert_eq!(after.replicas, before.replicas);
    assert_eq!(after.generation, before.generation);
}

#[tokio::test]
async fn act_clamps_even_when_policy_skips_the_guard() {
    // scripted policy proposes an increase at the max bound and a decrease
    // at the min bound; ACT must clamp both
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ScriptedPolicy::new(&[Action::Increase])),
        10,
        Duration::from_millis(100),
    );

    controller.step().await.unwrap();
    tx.send(empty_snapshot(1));
    controller.step().await.unwrap();
    assert_eq!(controller.step().await.unwrap(), ControllerState::Act);
    assert_eq!(controller.step().await.unwrap(), ControllerState::Collect);
    assert_eq!(controller.workload().unwrap().replicas, 10);

    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ScriptedPolicy::new(&[Action::Decrease])),
        1,
        Duration::from_millis(100),
    );

    controller.step().await.unwrap();
    tx.send(empty_snapshot(1));
    controller.step().await.unwrap();
    controller.step().await.unwrap();
    controller.step().await.unwrap();
    assert_eq!(controller.workload().unwrap().replicas, 1);
}

#[tokio::test]
async fn finish_action_terminates_and_deletes_exactly_once() {
    let orchestrator = Arc::new(CountingOrchestrator::new());
    let (mut controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ScriptedPolicy::new(&[Action::Finish])),
        2,
        Duration::from_millis(100),
    );

    controller.step().await.unwrap();
    tx.send(empty_snapshot(1));
    controller.step().await.unwrap();
    assert_eq!(controller.step().await.unwrap(), ControllerState::Act);
    assert_eq!(
        controller.step().await.unwrap(),
        ControllerState::Terminated
    );
    assert_eq!(orchestrator.delete_count(), 1);

    // further steps are no-ops
    assert_eq!(
        controller.step().await.unwrap(),
        ControllerState::Terminated
    );
    assert_eq!(orchestrator.delete_count(), 1);
    assert!(orchestrator.read("web", "default").await.is_err());
}

#[tokio::test]
async fn run_finishes_on_shutdown_signal() {
    let orchestrator = Arc::new(CountingOrchestrator::new());
    let (controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 50 }),
        2,
        Duration::from_millis(50),
    );

    tx.send(empty_snapshot(1));
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    handle.await.unwrap().unwrap();
    assert_eq!(orchestrator.delete_count(), 1);
    assert!(orchestrator.read("web", "default").await.is_err());
}

#[tokio::test]
async fn fatal_patch_error_surfaces_and_cleans_up() {
    let orchestrator = Arc::new(CountingOrchestrator::failing_patch());
    let (controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(ForcedDrawPolicy { draw: 80 }),
        5,
        Duration::from_millis(100),
    );

    tx.send(empty_snapshot(1));
    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let result = controller.run(shutdown_rx).await;

    assert!(result.is_err());
    // best-effort cleanup deleted the workload
    assert_eq!(orchestrator.delete_count(), 1);
    assert!(orchestrator.read("web", "default").await.is_err());
}

#[tokio::test]
async fn policy_error_is_fatal_not_defaulted_to_keep() {
    let orchestrator = Arc::new(CountingOrchestrator::new());
    let (controller, tx) = controller_with(
        orchestrator.clone(),
        Box::new(FailingPolicy),
        2,
        Duration::from_millis(100),
    );

    tx.send(empty_snapshot(1));
    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let result = controller.run(shutdown_rx).await;

    assert!(matches!(
        result,
        Err(super::ControllerError::Policy(_))
    ));
    assert_eq!(orchestrator.delete_count(), 1);
}

#[tokio::test]
async fn status_handle_tracks_transitions() {
    let orchestrator = Arc::new(InMemoryOrchestrator::with_seed(11));
    let (tx, rx) = mailbox();
    let status = super::StatusHandle::new();
    let mut controller = DecisionController::builder()
        .orchestrator(orchestrator)
        .mailbox(rx)
        .policy(Box::new(ForcedDrawPolicy { draw: 80 }))
        .workload_spec(spec(5))
        .receive_timeout(Duration::from_millis(100))
        .status(status.clone())
        .build()
        .expect("controller builds");

    controller.step().await.unwrap();
    tx.send(empty_snapshot(1));
    controller.step().await.unwrap();
    controller.step().await.unwrap();
    controller.step().await.unwrap();

    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.state, ControllerState::Collect);
    assert_eq!(snapshot.last_action, Some(Action::Increase));
    assert_eq!(snapshot.cycles, 1);
    assert_eq!(snapshot.workload.as_ref().unwrap().replicas, 6);
}

#[test]
fn builder_requires_all_collaborators() {
    let result = DecisionController::builder().build();
    assert!(result.is_err());
}
