//! App instance model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::status::AppStatus;
use crate::dns::records::DnsTemplate;

/// One deployed copy of an application on a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
    pub id: i64,

    /// Owning application
    pub app_id: i64,

    /// Target server
    pub server_id: i64,

    pub display_name: String,

    #[serde(default)]
    pub status: AppStatus,

    /// Legacy single-domain reference, used when no mappings exist
    #[serde(default)]
    pub main_domain_id: Option<i64>,

    /// Stable container name, unique per instance
    pub internal_container_name: String,

    pub docker_image: String,

    #[serde(default = "default_port")]
    pub docker_port: u16,

    /// Desired replica count. Not reconciled: one container per instance.
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,

    /// Extra DNS records to create alongside the base records
    #[serde(default)]
    pub dns_template: Option<DnsTemplate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_port() -> u16 {
    80
}

fn default_replicas() -> u32 {
    1
}

impl AppInstance {
    /// Create a new instance record in the `creating` state
    pub fn new(
        id: i64,
        app_id: i64,
        server_id: i64,
        display_name: impl Into<String>,
        internal_container_name: impl Into<String>,
        docker_image: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            app_id,
            server_id,
            display_name: display_name.into(),
            status: AppStatus::Creating,
            main_domain_id: None,
            internal_container_name: internal_container_name.into(),
            docker_image: docker_image.into(),
            docker_port: default_port(),
            replicas: default_replicas(),
            env_vars: BTreeMap::new(),
            dns_template: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Container port spec as understood by the runtime, e.g. `80/tcp`
    pub fn port_spec(&self) -> String {
        format!("{}/tcp", self.docker_port)
    }
}
