//! Scaling decision policies
//!
//! A policy is a pure function from the current workload state and the
//! latest filtered metrics to an [`Action`]. The controller treats it as an
//! injected dependency so deterministic test policies and production
//! policies plug into the same state machine.

use crate::models::{NodeMetric, PodMetric, Workload};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

/// Lower bound on the managed replica count
pub const MIN_REPLICAS: u32 = 1;
/// Upper bound on the managed replica count
pub const MAX_REPLICAS: u32 = 10;

/// Outcome of one decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Leave the replica count as is
    Keep,
    /// Add one replica
    Increase,
    /// Remove one replica
    Decrease,
    /// Tear the workload down and stop the loop
    Finish,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Keep => "keep",
            Action::Increase => "increase",
            Action::Decrease => "decrease",
            Action::Finish => "finish",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed policy evaluation; fatal for the control loop, never silently
/// treated as [`Action::Keep`]
#[derive(Debug, Error)]
#[error("policy evaluation failed: {0}")]
pub struct PolicyError(pub String);

/// Pluggable decision function evaluated in the DECIDE state
pub trait ScalingPolicy: Send + Sync {
    /// Policy name for logging and the status endpoint
    fn name(&self) -> &str;

    /// Compute the next action from the workload and its latest metrics
    fn decide(
        &self,
        workload: &Workload,
        pods: &[PodMetric],
        nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError>;
}

/// Map a uniform draw from `[1, 100]` to an action, guarding the replica
/// bounds: a decrease is never proposed at the minimum, an increase never
/// at the maximum.
pub fn action_for_draw(draw: u32, replicas: u32) -> Action {
    if draw < 25 && replicas > MIN_REPLICAS {
        Action::Decrease
    } else if draw > 75 && replicas < MAX_REPLICAS {
        Action::Increase
    } else {
        Action::Keep
    }
}

/// Reference policy: an unconditioned random draw standing in for real
/// utilization thresholds
///
/// Termination is not a policy outcome here; it comes from the external
/// shutdown signal.
pub struct RandomPolicy {
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for reproducible runs and tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalingPolicy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn decide(
        &self,
        workload: &Workload,
        _pods: &[PodMetric],
        _nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError> {
        let draw = self
            .rng
            .lock()
            .map_err(|_| PolicyError("rng lock poisoned".to_string()))?
            .gen_range(1..=100);
        Ok(action_for_draw(draw, workload.replicas))
    }
}

/// CPU-utilization policy: compares average pod CPU usage against the
/// workload's per-replica CPU request
pub struct UtilizationPolicy {
    /// Scale up above this utilization percentage
    high_watermark_percent: u32,
    /// Scale down below this utilization percentage
    low_watermark_percent: u32,
}

impl UtilizationPolicy {
    pub fn new(high_watermark_percent: u32, low_watermark_percent: u32) -> Self {
        Self {
            high_watermark_percent,
            low_watermark_percent,
        }
    }

    fn average_utilization_percent(workload: &Workload, pods: &[PodMetric]) -> Option<f64> {
        if pods.is_empty() {
            return None;
        }
        let requested_cores = workload.resources.requests.cpu_millicores as f64 / 1000.0;
        if requested_cores <= 0.0 {
            return None;
        }
        let total_usage: f64 = pods.iter().map(|p| p.cpu_usage_cores as f64).sum();
        let average = total_usage / pods.len() as f64;
        Some(average / requested_cores * 100.0)
    }
}

impl Default for UtilizationPolicy {
    fn default() -> Self {
        Self::new(80, 30)
    }
}

impl ScalingPolicy for UtilizationPolicy {
    fn name(&self) -> &str {
        "utilization"
    }

    fn decide(
        &self,
        workload: &Workload,
        pods: &[PodMetric],
        _nodes: &[NodeMetric],
    ) -> Result<Action, PolicyError> {
        if self.low_watermark_percent >= self.high_watermark_percent {
            return Err(PolicyError(format!(
                "low watermark {}% must be below high watermark {}%",
                self.low_watermark_percent, self.high_watermark_percent
            )));
        }

        // No owned pods reporting yet: nothing to act on
        let Some(utilization) = Self::average_utilization_percent(workload, pods) else {
            return Ok(Action::Keep);
        };

        if utilization > self.high_watermark_percent as f64 && workload.replicas < MAX_REPLICAS {
            Ok(Action::Increase)
        } else if utilization < self.low_watermark_percent as f64
            && workload.replicas > MIN_REPLICAS
        {
            Ok(Action::Decrease)
        } else {
            Ok(Action::Keep)
        }
    }
}
