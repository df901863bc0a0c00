//! Domain and domain mapping models

use serde::{Deserialize, Serialize};

/// A DNS zone under management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,

    pub domain_name: String,

    /// DNS provider key, e.g. `powerdns` or `cloudflare`
    pub provider_type: String,

    #[serde(default)]
    pub provider_credential_id: Option<i64>,

    #[serde(default)]
    pub is_wildcard: bool,

    #[serde(default = "default_true")]
    pub auto_ssl_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Domain {
    pub fn new(id: i64, domain_name: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            id,
            domain_name: domain_name.into(),
            provider_type: provider_type.into(),
            provider_credential_id: None,
            is_wildcard: false,
            auto_ssl_enabled: true,
        }
    }

    /// Wildcard domains with auto-SSL get a root certificate instead of host rules
    pub fn is_wildcard_root(&self) -> bool {
        self.is_wildcard && self.auto_ssl_enabled
    }
}

/// Binds an app instance to a domain, optionally under a subdomain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMapping {
    pub id: i64,
    pub app_instance_id: i64,
    pub domain_id: i64,

    #[serde(default)]
    pub subdomain: Option<String>,

    #[serde(default)]
    pub is_primary: bool,
}

/// Requested mapping, before it is given an id by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAttachment {
    pub domain_id: i64,

    #[serde(default)]
    pub subdomain: Option<String>,

    #[serde(default)]
    pub is_primary: bool,
}
