//! Container execution, local or through a per-server agent

pub mod agent;
pub mod classify;
pub mod client;
pub mod local;

use std::collections::BTreeMap;

use agent_protocol::{ContainerSummary, RunRequest};
use async_trait::async_trait;

use crate::errors::ContainerError;

pub use agent::AgentRuntime;
pub use classify::{is_missing_container, MISSING_CONTAINER_MARKERS};
pub use client::ExecutionClient;
pub use local::DockerCli;

/// Everything needed to create and start one container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,

    /// `80/tcp` to an optional fixed host port
    pub ports: BTreeMap<String, Option<u16>>,

    /// `host_path:container_path` bind mounts
    pub volumes: Vec<String>,

    /// First entry is attached at creation, the rest afterwards
    pub networks: Vec<String>,
}

impl RunSpec {
    pub fn to_request(&self) -> RunRequest {
        RunRequest {
            image: self.image.clone(),
            name: Some(self.name.clone()),
            env: self.env.clone(),
            labels: self.labels.clone(),
            ports: self.ports.clone(),
            volumes: self.volumes.clone(),
            networks: self.networks.clone(),
        }
    }
}

/// Container operations against one runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its id
    async fn run(&self, spec: &RunSpec) -> Result<String, ContainerError>;

    async fn stop(&self, container: &str) -> Result<(), ContainerError>;

    /// Force-remove a container
    async fn remove(&self, container: &str) -> Result<(), ContainerError>;

    async fn logs(&self, container: &str, tail: u32) -> Result<String, ContainerError>;

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError>;
}
