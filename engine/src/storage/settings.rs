//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::dns::records::RecordTarget;
use crate::logs::LogLevel;
use crate::models::server::deserialize_secret;
use crate::proxy::ProxyOptions;
use crate::storage::layout::DataLayout;

/// Environment variable overriding the agent token from the settings file
pub const AGENT_TOKEN_ENV: &str = "AGENT_TOKEN";

/// Environment variable overriding the PowerDNS API key
pub const PDNS_API_KEY_ENV: &str = "PDNS_API_KEY";

/// Engine and agent settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub proxy: ProxySettings,

    #[serde(default)]
    pub dns: DnsSettings,

    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(AGENT_TOKEN_ENV) {
            if !token.is_empty() {
                self.agent.token = Some(SecretString::from(token));
            }
        }
        if let Ok(key) = std::env::var(PDNS_API_KEY_ENV) {
            if !key.is_empty() {
                self.dns.powerdns_api_key = Some(SecretString::from(key));
            }
        }
        self
    }
}

/// Deployment engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Root of the per-instance data directories
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Network every app container joins
    #[serde(default = "default_shared_network")]
    pub shared_network: String,

    /// Timeout of one agent HTTP call, in seconds
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,

    #[serde(default = "default_log_tail")]
    pub default_log_tail: u32,
}

fn default_data_root() -> PathBuf {
    DataLayout::default().data_root
}

fn default_shared_network() -> String {
    "cp-net".to_string()
}

fn default_agent_timeout() -> u64 {
    15
}

fn default_log_tail() -> u32 {
    agent_protocol::DEFAULT_LOG_TAIL
}

impl EngineSettings {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn data_layout(&self) -> DataLayout {
        DataLayout::new(self.data_root.clone())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            shared_network: default_shared_network(),
            agent_timeout_secs: default_agent_timeout(),
            default_log_tail: default_log_tail(),
        }
    }
}

/// Reverse proxy settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    #[serde(default = "default_cert_resolver")]
    pub cert_resolver: String,
}

fn default_entrypoint() -> String {
    ProxyOptions::default().entrypoint
}

fn default_cert_resolver() -> String {
    ProxyOptions::default().cert_resolver
}

impl ProxySettings {
    pub fn options(&self) -> ProxyOptions {
        ProxyOptions {
            entrypoint: self.entrypoint.clone(),
            cert_resolver: self.cert_resolver.clone(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            entrypoint: default_entrypoint(),
            cert_resolver: default_cert_resolver(),
        }
    }
}

/// DNS record targets and the PowerDNS API
#[derive(Debug, Clone, Deserialize)]
pub struct DnsSettings {
    /// Address the apex A record points at
    #[serde(default = "default_ipv4")]
    pub ipv4: String,

    #[serde(default)]
    pub ipv6: Option<String>,

    #[serde(default = "default_powerdns_url")]
    pub powerdns_url: String,

    #[serde(default = "default_powerdns_server_id")]
    pub powerdns_server_id: String,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub powerdns_api_key: Option<SecretString>,
}

fn default_ipv4() -> String {
    RecordTarget::default().ipv4
}

fn default_powerdns_url() -> String {
    "http://cp-powerdns:8081/api/v1".to_string()
}

fn default_powerdns_server_id() -> String {
    "localhost".to_string()
}

impl DnsSettings {
    pub fn record_target(&self) -> RecordTarget {
        RecordTarget {
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone().filter(|v| !v.is_empty()),
        }
    }
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            ipv4: default_ipv4(),
            ipv6: None,
            powerdns_url: default_powerdns_url(),
            powerdns_server_id: default_powerdns_server_id(),
            powerdns_api_key: None,
        }
    }
}

/// Agent sidecar settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_host")]
    pub host: String,

    #[serde(default = "default_agent_port")]
    pub port: u16,

    /// Token required on mutating requests; none disables the check
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// Name reported by the health endpoint
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

fn default_agent_host() -> String {
    "0.0.0.0".to_string()
}

fn default_agent_port() -> u16 {
    8081
}

fn default_server_name() -> String {
    "kws-agent".to_string()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            host: default_agent_host(),
            port: default_agent_port(),
            token: None,
            server_name: default_server_name(),
        }
    }
}
