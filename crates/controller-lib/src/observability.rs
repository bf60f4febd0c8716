//! Observability infrastructure for the control loop
//!
//! Prometheus metrics for every transition, decision and orchestrator call,
//! plus a structured logger for lifecycle events.

use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, register_int_gauge_vec, GaugeVec,
    Histogram, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for orchestrator request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<LoopMetricsInner> = OnceLock::new();

struct LoopMetricsInner {
    snapshots_published: IntGauge,
    producer_tick_errors: IntGauge,
    receive_timeouts: IntGauge,
    decisions: IntGaugeVec,
    scale_operations: IntGaugeVec,
    state_transitions: IntGauge,
    current_replicas: IntGauge,
    controller_state_info: GaugeVec,
    orchestrator_latency_seconds: Histogram,
}

impl LoopMetricsInner {
    fn new() -> Self {
        Self {
            snapshots_published: register_int_gauge!(
                "autoscaler_snapshots_published_total",
                "Total number of metrics snapshots sent to the controller mailbox"
            )
            .expect("Failed to register snapshots_published_total"),

            producer_tick_errors: register_int_gauge!(
                "autoscaler_producer_tick_errors_total",
                "Total number of producer ticks skipped because a metrics query failed"
            )
            .expect("Failed to register producer_tick_errors_total"),

            receive_timeouts: register_int_gauge!(
                "autoscaler_receive_timeouts_total",
                "Total number of bounded receives that expired without a snapshot"
            )
            .expect("Failed to register receive_timeouts_total"),

            decisions: register_int_gauge_vec!(
                "autoscaler_decisions_total",
                "Total number of policy decisions by resulting action",
                &["action"]
            )
            .expect("Failed to register decisions_total"),

            scale_operations: register_int_gauge_vec!(
                "autoscaler_scale_operations_total",
                "Total number of applied replica adjustments by direction",
                &["direction"]
            )
            .expect("Failed to register scale_operations_total"),

            state_transitions: register_int_gauge!(
                "autoscaler_state_transitions_total",
                "Total number of controller state transitions"
            )
            .expect("Failed to register state_transitions_total"),

            current_replicas: register_int_gauge!(
                "autoscaler_current_replicas",
                "Replica count of the managed workload as last reported by the orchestrator"
            )
            .expect("Failed to register current_replicas"),

            controller_state_info: register_gauge_vec!(
                "autoscaler_controller_state_info",
                "Current controller state (the labeled series set to 1)",
                &["state"]
            )
            .expect("Failed to register controller_state_info"),

            orchestrator_latency_seconds: register_histogram!(
                "autoscaler_orchestrator_latency_seconds",
                "Time spent in orchestrator API calls",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register orchestrator_latency_seconds"),
        }
    }
}

/// Lightweight handle to the global loop metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct LoopMetrics {
    _private: (),
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopMetrics {
    /// Create a metrics handle (initializes the global registry if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(LoopMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &LoopMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_snapshots_published(&self) {
        self.inner().snapshots_published.inc();
    }

    pub fn inc_producer_tick_errors(&self) {
        self.inner().producer_tick_errors.inc();
    }

    pub fn inc_receive_timeouts(&self) {
        self.inner().receive_timeouts.inc();
    }

    pub fn inc_decision(&self, action: &str) {
        self.inner().decisions.with_label_values(&[action]).inc();
    }

    pub fn inc_scale_operation(&self, direction: &str) {
        self.inner()
            .scale_operations
            .with_label_values(&[direction])
            .inc();
    }

    pub fn inc_state_transitions(&self) {
        self.inner().state_transitions.inc();
    }

    pub fn set_current_replicas(&self, replicas: i64) {
        self.inner().current_replicas.set(replicas);
    }

    /// Point the state info series at the current state
    pub fn set_controller_state(&self, state: &str) {
        self.inner().controller_state_info.reset();
        self.inner()
            .controller_state_info
            .with_label_values(&[state])
            .set(1.0);
    }

    pub fn observe_orchestrator_latency(&self, duration_secs: f64) {
        self.inner()
            .orchestrator_latency_seconds
            .observe(duration_secs);
    }
}

/// Structured logger for control-loop lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    workload_name: String,
}

impl StructuredLogger {
    pub fn new(workload_name: impl Into<String>) -> Self {
        Self {
            workload_name: workload_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, policy: &str) {
        info!(
            event = "controller_started",
            workload = %self.workload_name,
            controller_version = %version,
            policy = %policy,
            "Replica controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            workload = %self.workload_name,
            reason = %reason,
            "Replica controller shutting down"
        );
    }

    pub fn log_scale(&self, old_replicas: u32, new_replicas: u32) {
        info!(
            event = "workload_scaled",
            workload = %self.workload_name,
            old_replicas = old_replicas,
            new_replicas = new_replicas,
            "Workload replica count adjusted"
        );
    }

    pub fn log_fatal(&self, error: &str) {
        warn!(
            event = "controller_fatal",
            workload = %self.workload_name,
            error = %error,
            "Control loop terminated by fatal error"
        );
    }
}
