//! Persistence port of the deployment engine
//!
//! The engine reads instances, servers, domains and mappings through
//! `InstanceStore` and is the only caller of `set_status`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::deploy::status::AppStatus;
use crate::errors::EngineError;
use crate::models::{AppInstance, Domain, DomainAttachment, DomainMapping, Server};

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get_instance(&self, instance_id: i64) -> Result<Option<AppInstance>, EngineError>;

    async fn get_server(&self, server_id: i64) -> Result<Option<Server>, EngineError>;

    async fn get_domain(&self, domain_id: i64) -> Result<Option<Domain>, EngineError>;

    async fn application_exists(&self, app_id: i64) -> Result<bool, EngineError>;

    /// Mappings of one instance, in no particular order
    async fn domain_mappings(&self, instance_id: i64) -> Result<Vec<DomainMapping>, EngineError>;

    /// Replace every mapping of an instance. At most one attachment may be primary.
    async fn replace_domain_mappings(
        &self,
        instance_id: i64,
        attachments: Vec<DomainAttachment>,
    ) -> Result<Vec<DomainMapping>, EngineError>;

    async fn set_status(&self, instance_id: i64, status: AppStatus) -> Result<(), EngineError>;
}

fn poisoned() -> EngineError {
    EngineError::StoreError("lock poisoned".to_string())
}

/// In-memory store for tests and local tooling.
///
/// Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    instances: RwLock<HashMap<i64, AppInstance>>,
    servers: RwLock<HashMap<i64, Server>>,
    domains: RwLock<HashMap<i64, Domain>>,
    applications: RwLock<HashSet<i64>>,
    mappings: RwLock<Vec<DomainMapping>>,
    next_mapping_id: RwLock<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_application(&self, app_id: i64) -> Result<(), EngineError> {
        self.applications.write().map_err(|_| poisoned())?.insert(app_id);
        Ok(())
    }

    pub fn insert_server(&self, server: Server) -> Result<(), EngineError> {
        self.servers.write().map_err(|_| poisoned())?.insert(server.id, server);
        Ok(())
    }

    pub fn insert_domain(&self, domain: Domain) -> Result<(), EngineError> {
        self.domains.write().map_err(|_| poisoned())?.insert(domain.id, domain);
        Ok(())
    }

    pub fn insert_instance(&self, instance: AppInstance) -> Result<(), EngineError> {
        self.instances
            .write()
            .map_err(|_| poisoned())?
            .insert(instance.id, instance);
        Ok(())
    }

    /// Current status of an instance, if it exists
    pub fn status_of(&self, instance_id: i64) -> Option<AppStatus> {
        self.instances
            .read()
            .ok()
            .and_then(|instances| instances.get(&instance_id).map(|i| i.status))
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn get_instance(&self, instance_id: i64) -> Result<Option<AppInstance>, EngineError> {
        let instances = self.instances.read().map_err(|_| poisoned())?;
        Ok(instances.get(&instance_id).cloned())
    }

    async fn get_server(&self, server_id: i64) -> Result<Option<Server>, EngineError> {
        let servers = self.servers.read().map_err(|_| poisoned())?;
        Ok(servers.get(&server_id).cloned())
    }

    async fn get_domain(&self, domain_id: i64) -> Result<Option<Domain>, EngineError> {
        let domains = self.domains.read().map_err(|_| poisoned())?;
        Ok(domains.get(&domain_id).cloned())
    }

    async fn application_exists(&self, app_id: i64) -> Result<bool, EngineError> {
        let applications = self.applications.read().map_err(|_| poisoned())?;
        Ok(applications.contains(&app_id))
    }

    async fn domain_mappings(&self, instance_id: i64) -> Result<Vec<DomainMapping>, EngineError> {
        let mappings = self.mappings.read().map_err(|_| poisoned())?;
        Ok(mappings
            .iter()
            .filter(|m| m.app_instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn replace_domain_mappings(
        &self,
        instance_id: i64,
        attachments: Vec<DomainAttachment>,
    ) -> Result<Vec<DomainMapping>, EngineError> {
        if attachments.iter().filter(|a| a.is_primary).count() > 1 {
            return Err(EngineError::ValidationError(format!(
                "App instance {} can have only one primary domain",
                instance_id
            )));
        }

        let mut mappings = self.mappings.write().map_err(|_| poisoned())?;
        let mut next_id = self.next_mapping_id.write().map_err(|_| poisoned())?;

        mappings.retain(|m| m.app_instance_id != instance_id);
        let created: Vec<DomainMapping> = attachments
            .into_iter()
            .map(|a| {
                *next_id += 1;
                DomainMapping {
                    id: *next_id,
                    app_instance_id: instance_id,
                    domain_id: a.domain_id,
                    subdomain: a.subdomain,
                    is_primary: a.is_primary,
                }
            })
            .collect();
        mappings.extend(created.iter().cloned());
        Ok(created)
    }

    async fn set_status(&self, instance_id: i64, status: AppStatus) -> Result<(), EngineError> {
        let mut instances = self.instances.write().map_err(|_| poisoned())?;
        let instance = instances
            .get_mut(&instance_id)
            .ok_or_else(|| EngineError::NotFound(format!("App instance {}", instance_id)))?;
        instance.status = status;
        instance.updated_at = Utc::now();
        Ok(())
    }
}
