//! Controller daemon configuration

use anyhow::Result;
use controller_lib::{ResourceRequirements, ResourceSpec, WorkloadSpec};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Daemon configuration, loaded from `SCALEWARD_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Name of the managed workload
    #[serde(default = "default_workload_name")]
    pub workload_name: String,

    /// Namespace of the managed workload
    #[serde(default = "default_namespace")]
    pub workload_namespace: String,

    /// Container image for the workload's pod template
    #[serde(default = "default_container_image")]
    pub container_image: String,

    /// Replica count the workload starts with
    #[serde(default = "default_initial_replicas")]
    pub initial_replicas: u32,

    /// Per-replica CPU request in millicores
    #[serde(default = "default_cpu_request")]
    pub cpu_request_millicores: u32,

    /// Per-replica CPU limit in millicores
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit_millicores: u32,

    /// Per-replica memory request in mebibytes
    #[serde(default = "default_memory_request")]
    pub memory_request_mebibytes: u64,

    /// Per-replica memory limit in mebibytes
    #[serde(default = "default_memory_limit")]
    pub memory_limit_mebibytes: u64,

    /// Metrics producer period in seconds
    #[serde(default = "default_producer_interval")]
    pub producer_interval_secs: u64,

    /// Bounded receive timeout in COLLECT, in seconds
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,

    /// Decision policy: "random" or "utilization"
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Seed for the random policy; unseeded if absent
    #[serde(default)]
    pub policy_seed: Option<u64>,

    /// Utilization policy: scale up above this CPU percentage
    #[serde(default = "default_high_watermark")]
    pub cpu_high_watermark_percent: u32,

    /// Utilization policy: scale down below this CPU percentage
    #[serde(default = "default_low_watermark")]
    pub cpu_low_watermark_percent: u32,

    /// Port for the local status/health/metrics endpoint
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_workload_name() -> String {
    "demo-web".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_container_image() -> String {
    "nginx:1.25".to_string()
}

fn default_initial_replicas() -> u32 {
    1
}

fn default_cpu_request() -> u32 {
    250
}

fn default_cpu_limit() -> u32 {
    500
}

fn default_memory_request() -> u64 {
    128
}

fn default_memory_limit() -> u64 {
    256
}

fn default_producer_interval() -> u64 {
    2
}

fn default_receive_timeout() -> u64 {
    10
}

fn default_policy() -> String {
    "random".to_string()
}

fn default_high_watermark() -> u32 {
    80
}

fn default_low_watermark() -> u32 {
    30
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workload_name: default_workload_name(),
            workload_namespace: default_namespace(),
            container_image: default_container_image(),
            initial_replicas: default_initial_replicas(),
            cpu_request_millicores: default_cpu_request(),
            cpu_limit_millicores: default_cpu_limit(),
            memory_request_mebibytes: default_memory_request(),
            memory_limit_mebibytes: default_memory_limit(),
            producer_interval_secs: default_producer_interval(),
            receive_timeout_secs: default_receive_timeout(),
            policy: default_policy(),
            policy_seed: None,
            cpu_high_watermark_percent: default_high_watermark(),
            cpu_low_watermark_percent: default_low_watermark(),
            api_port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SCALEWARD"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Workload spec for the managed workload
    pub fn workload_spec(&self) -> WorkloadSpec {
        WorkloadSpec {
            name: self.workload_name.clone(),
            namespace: self.workload_namespace.clone(),
            container_image: self.container_image.clone(),
            replicas: self.initial_replicas,
            resources: ResourceSpec {
                requests: ResourceRequirements {
                    cpu_millicores: self.cpu_request_millicores,
                    memory_bytes: self.memory_request_mebibytes << 20,
                },
                limits: ResourceRequirements {
                    cpu_millicores: self.cpu_limit_millicores,
                    memory_bytes: self.memory_limit_mebibytes << 20,
                },
            },
            template_labels: BTreeMap::from([("app".to_string(), self.workload_name.clone())]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.initial_replicas, 1);
        assert_eq!(config.receive_timeout_secs, 10);
        assert_eq!(config.producer_interval_secs, 2);
        assert!(config.cpu_low_watermark_percent < config.cpu_high_watermark_percent);
    }

    #[test]
    fn workload_spec_converts_units() {
        let config = AppConfig::default();
        let spec = config.workload_spec();
        assert_eq!(spec.resources.requests.memory_bytes, 128 << 20);
        assert_eq!(spec.template_labels["app"], spec.name);
    }
}
