//! Remote execution client
//!
//! Picks the runtime for a server once per call: servers that need the
//! agent get an `AgentRuntime`, the master without an agent URL gets the
//! local runtime.

use std::sync::Arc;
use std::time::Duration;

use agent_protocol::ContainerSummary;
use reqwest::Client;
use tracing::info;

use crate::errors::{ContainerError, EngineError};
use crate::models::Server;
use crate::runtime::classify::is_missing_container;
use crate::runtime::{AgentRuntime, ContainerRuntime, RunSpec};

pub struct ExecutionClient {
    local: Arc<dyn ContainerRuntime>,
    http: Client,
}

impl ExecutionClient {
    /// Create a client; agent calls give up after `agent_timeout`
    pub fn new(local: Arc<dyn ContainerRuntime>, agent_timeout: Duration) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(agent_timeout)
            .build()
            .map_err(|e| EngineError::ConfigError(format!("Failed to build agent HTTP client: {}", e)))?;
        Ok(Self { local, http })
    }

    /// The runtime serving a server
    pub fn runtime_for(&self, server: &Server) -> Result<Arc<dyn ContainerRuntime>, ContainerError> {
        if server.uses_agent() {
            Ok(Arc::new(AgentRuntime::for_server(self.http.clone(), server)?))
        } else {
            Ok(self.local.clone())
        }
    }

    pub async fn run(&self, server: &Server, spec: &RunSpec) -> Result<String, EngineError> {
        info!("Starting container {} on server {}", spec.name, server.name);
        let runtime = self.runtime_for(server)?;
        Ok(runtime.run(spec).await?)
    }

    pub async fn stop(&self, server: &Server, container: &str) -> Result<(), EngineError> {
        info!("Stopping container {} on server {}", container, server.name);
        let runtime = self.runtime_for(server)?;
        Ok(runtime.stop(container).await?)
    }

    pub async fn remove(&self, server: &Server, container: &str) -> Result<(), EngineError> {
        info!("Removing container {} on server {}", container, server.name);
        let runtime = self.runtime_for(server)?;
        Ok(runtime.remove(container).await?)
    }

    pub async fn logs(&self, server: &Server, container: &str, tail: u32) -> Result<String, EngineError> {
        info!("Fetching logs for {} on server {}", container, server.name);
        let runtime = self.runtime_for(server)?;
        Ok(runtime.logs(container, tail).await?)
    }

    pub async fn list_containers(&self, server: &Server) -> Result<Vec<ContainerSummary>, EngineError> {
        info!("Listing containers on server {}", server.name);
        let runtime = self.runtime_for(server)?;
        Ok(runtime.list().await?)
    }

    /// Stop, treating a missing container as already stopped.
    /// Returns whether a container was found.
    pub async fn stop_if_present(&self, server: &Server, container: &str) -> Result<bool, EngineError> {
        match self.stop(server, container).await {
            Ok(()) => Ok(true),
            Err(e) if is_missing_container(&e) => {
                info!("Container {} not present on {}, nothing to stop", container, server.name);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove, treating a missing container as already removed.
    /// Returns whether a container was found.
    pub async fn remove_if_present(&self, server: &Server, container: &str) -> Result<bool, EngineError> {
        match self.remove(server, container).await {
            Ok(()) => Ok(true),
            Err(e) if is_missing_container(&e) => {
                info!("Container {} not present on {}, nothing to remove", container, server.name);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
