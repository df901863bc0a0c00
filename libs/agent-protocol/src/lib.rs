//! Agent protocol
//!
//! Request and response bodies exchanged between the control panel and the
//! per-server container agent. Both sides depend on this crate so the wire
//! format has a single definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Header carrying the shared agent token on mutating requests
pub const AGENT_TOKEN_HEADER: &str = "X-Agent-Token";

pub const RUN_PATH: &str = "/docker/run";
pub const STOP_PATH: &str = "/docker/stop";
pub const REMOVE_PATH: &str = "/docker/remove";
pub const LOGS_PATH: &str = "/docker/logs";
pub const CONTAINERS_PATH: &str = "/docker/containers";
pub const INFO_PATH: &str = "/info";
pub const METRICS_PATH: &str = "/metrics";

/// Tail used by the agent when the caller omits one
pub const DEFAULT_LOG_TAIL: u32 = 200;

/// Create and start a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub image: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Container port spec (`80/tcp`) to an optional fixed host port.
    /// `None` lets the runtime pick an ephemeral host port.
    #[serde(default)]
    pub ports: BTreeMap<String, Option<u16>>,

    /// Bind mounts as `host_path:container_path`
    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Body of the stop and remove calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRequest {
    #[serde(default)]
    pub container: Option<String>,
}

impl ContainerRequest {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsQuery {
    pub container: String,

    #[serde(default = "default_tail")]
    pub tail: u32,
}

fn default_tail() -> u32 {
    DEFAULT_LOG_TAIL
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub logs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainersRequest {
    #[serde(default)]
    pub filters: BTreeMap<String, serde_json::Value>,
}

/// Summary of one container as listed by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
}

impl ContainerSummary {
    /// Docker reports running containers as `running` or `Up ...`
    pub fn is_running(&self) -> bool {
        let status = self.status.to_lowercase();
        status == "running" || status.starts_with("up")
    }
}

/// Error body returned by the agent on any non-2xx response.
///
/// `detail` is usually a string but may be any JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: serde_json::Value::String(detail.into()),
        }
    }

    /// The detail rendered as plain text
    pub fn detail_text(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
}

/// Host identity reported by `/info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub hostname: String,
    pub os: String,
    pub ip_addresses: Vec<String>,
    pub docker_available: bool,
}

/// Host load reported by `/metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub docker_running_containers: usize,
    pub docker_total_containers: usize,
}
