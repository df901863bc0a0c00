//! Local container runtime driven through the docker CLI

use std::process::Stdio;

use agent_protocol::ContainerSummary;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::ContainerError;
use crate::runtime::{ContainerRuntime, RunSpec};

/// Runs containers on this host with the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run one docker command, returning stdout.
    ///
    /// Failures mentioning a missing container become the typed
    /// `ContainerError::NotFound` when `container` is given.
    async fn exec(
        &self,
        operation: &'static str,
        args: &[String],
        container: Option<&str>,
    ) -> Result<String, ContainerError> {
        debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ContainerError::Runtime {
                operation,
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if let Some(container) = container {
                if stderr.to_lowercase().contains("no such container") {
                    return Err(ContainerError::NotFound {
                        container: container.to_string(),
                    });
                }
            }
            return Err(ContainerError::Runtime {
                operation,
                message: stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Arguments of `docker run` for a spec. Only the first network is attached
/// here since the CLI accepts a single network at creation.
pub fn build_run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &spec.labels {
        args.push("-l".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (port, host_port) in &spec.ports {
        args.push("-p".to_string());
        match host_port {
            Some(host_port) => args.push(format!("{}:{}", host_port, port)),
            None => args.push(port.clone()),
        }
    }
    for volume in &spec.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    if let Some(network) = spec.networks.first() {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    args.push(spec.image.clone());
    args
}

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Status")]
    status: String,
}

fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerSummary>, ContainerError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let ps: PsLine = serde_json::from_str(line).map_err(|e| ContainerError::Runtime {
                operation: "ps",
                message: format!("unexpected output: {}", e),
            })?;
            Ok(ContainerSummary {
                id: ps.id,
                name: ps.names,
                image: ps.image,
                status: ps.status,
            })
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn run(&self, spec: &RunSpec) -> Result<String, ContainerError> {
        // A failed pull falls back to the image already on the host
        let pull = vec!["pull".to_string(), spec.image.clone()];
        if let Err(e) = self.exec("pull", &pull, None).await {
            warn!("Failed to pull image {}: {}", spec.image, e);
        }

        let args = build_run_args(spec);
        let stdout = self.exec("run", &args, None).await?;
        let id = stdout.trim().to_string();
        if id.is_empty() {
            return Err(ContainerError::MissingContainerId);
        }

        for network in spec.networks.iter().skip(1) {
            let args = vec![
                "network".to_string(),
                "connect".to_string(),
                network.clone(),
                spec.name.clone(),
            ];
            if let Err(e) = self.exec("network connect", &args, Some(&spec.name)).await {
                warn!(
                    "Failed to connect container {} to network {}: {}",
                    spec.name, network, e
                );
            }
        }

        info!("Started container {} ({})", spec.name, id);
        Ok(id)
    }

    async fn stop(&self, container: &str) -> Result<(), ContainerError> {
        let args = vec!["stop".to_string(), container.to_string()];
        self.exec("stop", &args, Some(container)).await?;
        Ok(())
    }

    async fn remove(&self, container: &str) -> Result<(), ContainerError> {
        let args = vec!["rm".to_string(), "-f".to_string(), container.to_string()];
        self.exec("rm", &args, Some(container)).await?;
        Ok(())
    }

    async fn logs(&self, container: &str, tail: u32) -> Result<String, ContainerError> {
        debug!("{} logs --tail {} {}", self.binary, tail, container);

        // Container stderr lands on our stderr, so both streams are log output
        let tail = tail.to_string();
        let output = Command::new(&self.binary)
            .args(["logs", "--tail", tail.as_str(), container])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ContainerError::Runtime {
                operation: "logs",
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            if stderr.to_lowercase().contains("no such container") {
                return Err(ContainerError::NotFound {
                    container: container.to_string(),
                });
            }
            return Err(ContainerError::Runtime {
                operation: "logs",
                message: stderr.trim().to_string(),
            });
        }

        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&stderr);
        Ok(logs)
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.exec("ps", &args, None).await?;
        parse_ps_output(&stdout)
    }
}
