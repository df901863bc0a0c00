//! Server state

use std::sync::Arc;

use secrecy::SecretString;

use crate::runtime::ContainerRuntime;

/// Server state shared across handlers
pub struct AgentState {
    pub runtime: Arc<dyn ContainerRuntime>,

    /// Required on mutating requests when set
    pub token: Option<SecretString>,

    /// Name reported by `/health`
    pub server_name: String,
}

impl AgentState {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        token: Option<SecretString>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            token,
            server_name: server_name.into(),
        }
    }
}
