//! Server model

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// A deployment target
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: i64,

    pub name: String,

    /// The control panel's own host
    #[serde(default)]
    pub is_master: bool,

    /// Base URL of the per-server agent
    #[serde(default)]
    pub agent_url: Option<String>,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub agent_token: Option<SecretString>,
}

pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
}

impl Server {
    /// The master server, driven through the local runtime
    pub fn master(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_master: true,
            agent_url: None,
            agent_token: None,
        }
    }

    /// A remote server reached through its agent
    pub fn remote(id: i64, name: impl Into<String>, agent_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_master: false,
            agent_url: Some(agent_url.into()),
            agent_token: None,
        }
    }

    pub fn with_agent_token(mut self, token: impl Into<String>) -> Self {
        self.agent_token = Some(SecretString::from(token.into()));
        self
    }

    /// Whether container operations must go through the agent.
    ///
    /// Non-master servers always do; the master does too once it has an
    /// agent URL configured.
    pub fn uses_agent(&self) -> bool {
        !self.is_master || self.agent_url.is_some()
    }
}
