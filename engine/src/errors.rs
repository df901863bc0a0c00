//! Error types for the deployment engine

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("DNS error: {0}")]
    DnsError(String),

    #[error("DNS provisioning error: {0}")]
    DnsProvisioning(#[from] DnsProvisioningError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Restore error: {0}")]
    Swap(#[from] SwapError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for errors raised before any state was touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::ValidationError(_)
                | EngineError::NotFound(_)
                | EngineError::Swap(SwapError::InvalidSource { .. })
        )
    }
}

/// Container operation failures, local or agent-backed
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The local runtime reported the container does not exist
    #[error("No such container: {container}")]
    NotFound { container: String },

    /// The agent answered with a non-success status
    #[error("agent responded {status}: {}", agent_message(.detail, .body))]
    Agent {
        status: u16,
        detail: Option<String>,
        body: String,
    },

    #[error("agent request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("agent request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid agent URL {url}: {reason}")]
    InvalidAgentUrl { url: String, reason: String },

    #[error("docker {operation} failed: {message}")]
    Runtime {
        operation: &'static str,
        message: String,
    },

    #[error("agent did not return a container id")]
    MissingContainerId,
}

fn agent_message(detail: &Option<String>, body: &String) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => body.clone(),
    }
}

impl ContainerError {
    /// Classify a transport failure from the agent HTTP client
    pub fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ContainerError::Timeout {
                url: url.to_string(),
                source: err,
            }
        } else {
            ContainerError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// One domain that could not be provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFailure {
    pub domain_name: String,
    pub reason: String,
}

/// DNS provisioning failed for at least one domain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed for domain(s): {}", failed_names(.failures))]
pub struct DnsProvisioningError {
    pub failures: Vec<DomainFailure>,
}

fn failed_names(failures: &[DomainFailure]) -> String {
    failures
        .iter()
        .map(|f| f.domain_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DnsProvisioningError {
    pub fn domain_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.domain_name.as_str()).collect()
    }
}

/// Data directory swap failures
#[derive(Error, Debug)]
pub enum SwapError {
    /// Restore source failed validation; nothing was touched
    #[error("invalid restore source {}: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    /// Copying the source into the staging directory failed; live data untouched
    #[error("failed to stage restore source {}", .path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The live swap failed and was rolled back
    #[error("failed to swap data directory {} ({cause}); previous content restored: {restored_previous}", .path.display())]
    RolledBack {
        path: PathBuf,
        cause: String,
        restored_previous: bool,
    },
}
