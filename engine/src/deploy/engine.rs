//! Deployment engine
//!
//! Drives an app instance's DNS records and container to its declared state
//! and owns the instance's status. Every operation holds the instance lock
//! for its whole duration and reloads the instance and server from the store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::deploy::locks::InstanceLocks;
use crate::deploy::status::{AppStatus, StatusEvent};
use crate::deploy::store::InstanceStore;
use crate::dns::{provision_dns, DnsManager, DnsProvisionReport, ProviderDnsManager};
use crate::domains::names::normalize_subdomain;
use crate::domains::{resolve_domain_context, DomainResolution};
use crate::errors::{DnsProvisioningError, EngineError};
use crate::filesys::dir::Dir;
use crate::models::{AppInstance, Domain, DomainAttachment, Server};
use crate::proxy::{build_labels, ProxyOptions};
use crate::restore::{DataDirSwap, SwapReport};
use crate::runtime::{ContainerRuntime, ExecutionClient, RunSpec};
use crate::storage::layout::DataLayout;
use crate::storage::settings::Settings;

/// Engine-wide deployment options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub data: DataLayout,
    pub proxy: ProxyOptions,

    /// Network every app container joins
    pub shared_network: String,

    pub default_log_tail: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            data: DataLayout::default(),
            proxy: ProxyOptions::default(),
            shared_network: "cp-net".to_string(),
            default_log_tail: agent_protocol::DEFAULT_LOG_TAIL,
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data: settings.engine.data_layout(),
            proxy: settings.proxy.options(),
            shared_network: settings.engine.shared_network.clone(),
            default_log_tail: settings.engine.default_log_tail,
        }
    }
}

/// Result of a deploy, restart or restore
#[derive(Debug)]
pub struct Deployment {
    pub instance_id: i64,
    pub container_id: String,
    pub status: AppStatus,

    /// Routed FQDNs, primary first
    pub fqdns: Vec<String>,

    pub dns: Option<DnsProvisionReport>,

    /// DNS failure tolerated during a restart
    pub dns_warning: Option<DnsProvisioningError>,

    /// Present when the data directory was replaced
    pub swap: Option<SwapReport>,
}

/// Instance and server loaded for one operation
struct Target {
    instance: AppInstance,
    server: Server,
}

pub struct DeploymentEngine {
    store: Arc<dyn InstanceStore>,
    dns: Arc<dyn DnsManager>,
    executor: ExecutionClient,
    options: EngineOptions,
    locks: InstanceLocks,
}

impl DeploymentEngine {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        dns: Arc<dyn DnsManager>,
        executor: ExecutionClient,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            dns,
            executor,
            options,
            locks: InstanceLocks::new(),
        }
    }

    /// Engine wired from settings: agent calls and PowerDNS calls share the
    /// configured timeout, and `local` serves the master server.
    pub fn from_settings(
        store: Arc<dyn InstanceStore>,
        local: Arc<dyn ContainerRuntime>,
        settings: &Settings,
    ) -> Result<Self, EngineError> {
        let timeout = settings.engine.agent_timeout();
        let executor = ExecutionClient::new(local, timeout)?;
        let dns = ProviderDnsManager::from_settings(&settings.dns, timeout)?;

        Ok(Self::new(
            store,
            Arc::new(dns),
            executor,
            EngineOptions::from_settings(settings),
        ))
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Provision DNS, then create and start the instance's container.
    ///
    /// A DNS failure on any domain aborts before the container is touched.
    /// Every failure after validation leaves the instance in `error`.
    pub async fn deploy(&self, instance_id: i64) -> Result<Deployment, EngineError> {
        let _guard = self.locks.lock(instance_id).await;
        let target = self.load(instance_id).await?;
        info!(
            "Deploying app instance {} ({}) on server {}",
            target.instance.id, target.instance.display_name, target.server.name
        );

        match self.deploy_steps(&target).await {
            Ok(deployment) => Ok(deployment),
            Err(e) => Err(self.fail(&target.instance, "Deployment", e).await),
        }
    }

    async fn deploy_steps(&self, target: &Target) -> Result<Deployment, EngineError> {
        let instance = &target.instance;
        let resolution = self.resolve(instance).await?;
        let dns = provision_dns(self.dns.as_ref(), instance, &resolution.contexts).await?;

        let data_dir = self.options.data.instance_dir(instance)?;
        data_dir.create().await?;

        let spec = self.run_spec(instance, &resolution, &data_dir);
        let container_id = self.executor.run(&target.server, &spec).await?;
        info!("Deployed container {} for app instance {}", container_id, instance.id);

        let status = self.record(instance, StatusEvent::Deployed).await?;
        Ok(Deployment {
            instance_id: instance.id,
            container_id,
            status,
            fqdns: resolution.fqdns,
            dns: Some(dns),
            dns_warning: None,
            swap: None,
        })
    }

    /// Stop the instance's container. A missing container counts as stopped;
    /// any other failure leaves the instance in `error`.
    pub async fn stop(&self, instance_id: i64) -> Result<AppStatus, EngineError> {
        let _guard = self.locks.lock(instance_id).await;
        let target = self.load(instance_id).await?;
        info!("Stopping app instance {}", instance_id);

        match self.stop_steps(&target).await {
            Ok(status) => Ok(status),
            Err(e) => Err(self.fail(&target.instance, "Stop", e).await),
        }
    }

    async fn stop_steps(&self, target: &Target) -> Result<AppStatus, EngineError> {
        let found = self
            .executor
            .stop_if_present(&target.server, &target.instance.internal_container_name)
            .await?;
        if !found {
            info!("App instance {} had no container to stop", target.instance.id);
        }

        self.record(&target.instance, StatusEvent::Stopped).await
    }

    /// Recreate the instance's container, optionally replacing its data
    /// directory with `restore_source` first.
    ///
    /// DNS is re-provisioned but a DNS failure only produces a warning.
    pub async fn restart(
        &self,
        instance_id: i64,
        restore_source: Option<&Path>,
    ) -> Result<Deployment, EngineError> {
        let _guard = self.locks.lock(instance_id).await;
        let target = self.load(instance_id).await?;
        if let Some(source) = restore_source {
            DataDirSwap::validate_source(source).await?;
        }
        info!(
            "Restarting app instance {} on server {}",
            target.instance.id, target.server.name
        );

        match self.restart_steps(&target, restore_source).await {
            Ok(deployment) => Ok(deployment),
            Err(e) => Err(self.fail(&target.instance, "Restart", e).await),
        }
    }

    /// Restart with the data directory replaced by `source`
    pub async fn restore(&self, instance_id: i64, source: &Path) -> Result<Deployment, EngineError> {
        self.restart(instance_id, Some(source)).await
    }

    async fn restart_steps(
        &self,
        target: &Target,
        restore_source: Option<&Path>,
    ) -> Result<Deployment, EngineError> {
        let instance = &target.instance;
        let resolution = self.resolve(instance).await?;

        let (dns, dns_warning) =
            match provision_dns(self.dns.as_ref(), instance, &resolution.contexts).await {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    warn!(
                        "Continuing restart of app instance {} despite DNS failure: {}",
                        instance.id, e
                    );
                    (None, Some(e))
                }
            };

        let data_dir = self.options.data.instance_dir(instance)?;
        let swap = match restore_source {
            Some(source) => {
                let swapper = DataDirSwap::new(data_dir.clone());
                let report = swapper
                    .replace_from(source, || self.remove_container(target))
                    .await?;
                Some(swapper.into_result(report)?)
            }
            None => {
                self.remove_container(target).await?;
                data_dir.create().await?;
                None
            }
        };

        let spec = self.run_spec(instance, &resolution, &data_dir);
        let container_id = self.executor.run(&target.server, &spec).await?;
        info!("Restarted container {} for app instance {}", container_id, instance.id);

        let status = self.record(instance, StatusEvent::Deployed).await?;
        Ok(Deployment {
            instance_id: instance.id,
            container_id,
            status,
            fqdns: resolution.fqdns,
            dns,
            dns_warning,
            swap,
        })
    }

    /// Container logs; `tail` defaults to the configured line count
    pub async fn get_logs(&self, instance_id: i64, tail: Option<u32>) -> Result<String, EngineError> {
        let target = self.load(instance_id).await?;
        let tail = tail.unwrap_or(self.options.default_log_tail);
        self.executor
            .logs(&target.server, &target.instance.internal_container_name, tail)
            .await
    }

    /// Replace the instance's domain mappings, returning the resulting FQDNs.
    ///
    /// Takes effect on the next deploy or restart.
    pub async fn attach_domains(
        &self,
        instance_id: i64,
        attachments: Vec<DomainAttachment>,
    ) -> Result<Vec<String>, EngineError> {
        let _guard = self.locks.lock(instance_id).await;
        let instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("App instance {}", instance_id)))?;

        if attachments.iter().filter(|a| a.is_primary).count() > 1 {
            return Err(EngineError::ValidationError(
                "Only one domain can be primary".to_string(),
            ));
        }

        let mut normalized = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            if self.store.get_domain(attachment.domain_id).await?.is_none() {
                return Err(EngineError::ValidationError(format!(
                    "Domain {} not found",
                    attachment.domain_id
                )));
            }
            let subdomain = normalize_subdomain(attachment.subdomain.as_deref());
            normalized.push(DomainAttachment {
                domain_id: attachment.domain_id,
                subdomain: (!subdomain.is_empty()).then_some(subdomain),
                is_primary: attachment.is_primary,
            });
        }

        let mappings = self
            .store
            .replace_domain_mappings(instance_id, normalized)
            .await?;
        info!(
            "Attached {} domain(s) to app instance {}",
            mappings.len(),
            instance_id
        );

        Ok(self.resolve(&instance).await?.fqdns)
    }

    async fn load(&self, instance_id: i64) -> Result<Target, EngineError> {
        let instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("App instance {}", instance_id)))?;

        if !self.store.application_exists(instance.app_id).await? {
            return Err(EngineError::ValidationError(format!(
                "Application {} for app instance {} not found",
                instance.app_id, instance_id
            )));
        }

        let server = self.store.get_server(instance.server_id).await?.ok_or_else(|| {
            EngineError::ValidationError(format!(
                "Server {} for app instance {} not found",
                instance.server_id, instance_id
            ))
        })?;

        Ok(Target { instance, server })
    }

    async fn resolve(&self, instance: &AppInstance) -> Result<DomainResolution, EngineError> {
        let mappings = self.store.domain_mappings(instance.id).await?;

        let mut domains: HashMap<i64, Domain> = HashMap::new();
        let ids = mappings
            .iter()
            .map(|m| m.domain_id)
            .chain(instance.main_domain_id);
        for id in ids {
            if domains.contains_key(&id) {
                continue;
            }
            match self.store.get_domain(id).await? {
                Some(domain) => {
                    domains.insert(id, domain);
                }
                None => warn!("Domain {} of app instance {} no longer exists", id, instance.id),
            }
        }

        Ok(resolve_domain_context(instance, &mappings, &domains))
    }

    fn run_spec(&self, instance: &AppInstance, resolution: &DomainResolution, data_dir: &Dir) -> RunSpec {
        let labels = build_labels(
            instance,
            &resolution.fqdns,
            &resolution.wildcard_roots,
            &self.options.proxy,
        );

        RunSpec {
            image: instance.docker_image.clone(),
            name: instance.internal_container_name.clone(),
            env: instance.env_vars.clone(),
            labels,
            ports: [(instance.port_spec(), None)].into_iter().collect(),
            volumes: vec![DataLayout::volume_spec(data_dir)],
            networks: vec![self.options.shared_network.clone()],
        }
    }

    /// Stop and remove, tolerating a container that is already gone
    async fn remove_container(&self, target: &Target) -> Result<(), EngineError> {
        let name = &target.instance.internal_container_name;
        self.executor.stop_if_present(&target.server, name).await?;
        self.executor.remove_if_present(&target.server, name).await?;
        Ok(())
    }

    async fn record(&self, instance: &AppInstance, event: StatusEvent) -> Result<AppStatus, EngineError> {
        let status = instance.status.apply(event);
        self.store.set_status(instance.id, status).await?;
        info!("App instance {} is now {}", instance.id, status);
        Ok(status)
    }

    /// Put the instance into `error` and hand back the original failure.
    /// The status write is retried once.
    async fn fail(&self, instance: &AppInstance, operation: &str, err: EngineError) -> EngineError {
        error!("{} failed for app instance {}: {}", operation, instance.id, err);

        let status = instance.status.apply(StatusEvent::Failed);
        for attempt in 1..=2 {
            match self.store.set_status(instance.id, status).await {
                Ok(()) => break,
                Err(e) => error!(
                    "Failed to mark app instance {} as {} (attempt {}): {}",
                    instance.id, status, attempt, e
                ),
            }
        }
        err
    }
}
