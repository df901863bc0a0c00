//! Shared fakes and fixtures

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_protocol::ContainerSummary;
use async_trait::async_trait;
use kws_engine::deploy::{DeploymentEngine, EngineOptions, MemoryStore};
use kws_engine::dns::records::{DnsRecord, RecordType};
use kws_engine::dns::DnsManager;
use kws_engine::errors::{ContainerError, EngineError};
use kws_engine::models::{AppInstance, Domain, DomainAttachment, Server};
use kws_engine::runtime::{ContainerRuntime, ExecutionClient, RunSpec};
use kws_engine::deploy::InstanceStore;
use kws_engine::storage::layout::DataLayout;
use tempfile::TempDir;

pub const INSTANCE_ID: i64 = 7;
pub const CONTAINER: &str = "cp-app-7";

type Hook = Box<dyn Fn() + Send + Sync>;

/// Container runtime keeping containers in memory and counting calls
#[derive(Default)]
pub struct FakeRuntime {
    pub runs: AtomicUsize,
    pub stops: AtomicUsize,
    pub removes: AtomicUsize,
    pub fail_run: AtomicBool,
    pub fail_stop: AtomicBool,
    pub fail_list: AtomicBool,
    pub containers: Mutex<HashSet<String>>,
    pub last_spec: Mutex<Option<RunSpec>>,
    pub last_tail: Mutex<Option<u32>>,

    /// How long run and stop take
    pub latency: Mutex<Duration>,

    /// `run:start`, `run:end`, `stop:start`, `stop:end` in call order
    pub events: Mutex<Vec<&'static str>>,

    /// Called inside every remove
    pub on_remove: Mutex<Option<Hook>>,
}

impl FakeRuntime {
    pub fn with_container(name: &str) -> Self {
        let runtime = Self::default();
        runtime.containers.lock().unwrap().insert(name.to_string());
        runtime
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.lock().unwrap().contains(name)
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    async fn simulate(&self, start: &'static str, end: &'static str) {
        self.events.lock().unwrap().push(start);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.events.lock().unwrap().push(end);
    }

    fn missing(&self, name: &str) -> Result<(), ContainerError> {
        if self.has_container(name) {
            Ok(())
        } else {
            Err(ContainerError::NotFound {
                container: name.to_string(),
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run(&self, spec: &RunSpec) -> Result<String, ContainerError> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        self.simulate("run:start", "run:end").await;
        if self.fail_run.load(Ordering::SeqCst) {
            return Err(ContainerError::Runtime {
                operation: "run",
                message: "pull access denied".to_string(),
            });
        }
        self.containers.lock().unwrap().insert(spec.name.clone());
        Ok(format!("cid-{}", n))
    }

    async fn stop(&self, container: &str) -> Result<(), ContainerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.simulate("stop:start", "stop:end").await;
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(ContainerError::Runtime {
                operation: "stop",
                message: "permission denied while trying to connect to the Docker daemon".to_string(),
            });
        }
        self.missing(container)
    }

    async fn remove(&self, container: &str) -> Result<(), ContainerError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_remove.lock().unwrap().as_ref() {
            hook();
        }
        self.missing(container)?;
        self.containers.lock().unwrap().remove(container);
        Ok(())
    }

    async fn logs(&self, container: &str, tail: u32) -> Result<String, ContainerError> {
        self.missing(container)?;
        *self.last_tail.lock().unwrap() = Some(tail);
        Ok(format!("{} lines of {}", tail, container))
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ContainerError::Runtime {
                operation: "ps",
                message: "Cannot connect to the Docker daemon".to_string(),
            });
        }
        let mut names: Vec<String> = self.containers.lock().unwrap().iter().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ContainerSummary {
                id: format!("id-{}", name),
                image: "nginx:latest".to_string(),
                status: "running".to_string(),
                name,
            })
            .collect())
    }
}

/// DNS manager failing for chosen domain names
#[derive(Default)]
pub struct FakeDns {
    pub calls: AtomicUsize,
    pub fail_for: HashSet<String>,
    pub seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeDns {
    pub fn failing(domains: &[&str]) -> Self {
        Self {
            fail_for: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DnsManager for FakeDns {
    async fn create_records_for_deployment(
        &self,
        _instance: &AppInstance,
        domain: &Domain,
        subdomains: &[String],
    ) -> Result<Vec<DnsRecord>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((domain.domain_name.clone(), subdomains.to_vec()));

        if self.fail_for.contains(&domain.domain_name) {
            return Err(EngineError::DnsError(format!(
                "zone {} rejected the update",
                domain.domain_name
            )));
        }

        let mut records = vec![DnsRecord::new(domain, RecordType::A, "@", "203.0.113.10")];
        for sub in subdomains {
            records.push(DnsRecord::new(domain, RecordType::Cname, sub, &domain.domain_name));
        }
        Ok(records)
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub dns: Arc<FakeDns>,
    pub runtime: Arc<FakeRuntime>,
    pub engine: DeploymentEngine,
    pub data_root: TempDir,
}

impl Fixture {
    pub fn runs(&self) -> usize {
        self.runtime.runs.load(Ordering::SeqCst)
    }

    pub fn data_dir(&self) -> std::path::PathBuf {
        self.data_root.path().join(CONTAINER)
    }
}

/// Instance 7 on the master server, mapped to `a.com` (primary) and `api.b.com`
pub async fn fixture(dns: FakeDns, runtime: FakeRuntime) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.insert_application(1).unwrap();
    store.insert_server(Server::master(1, "master")).unwrap();
    store.insert_domain(Domain::new(1, "a.com", "powerdns")).unwrap();
    store.insert_domain(Domain::new(2, "b.com", "cloudflare")).unwrap();

    let mut instance = AppInstance::new(INSTANCE_ID, 1, 1, "Shop", CONTAINER, "nginx:latest");
    instance.env_vars.insert("MODE".to_string(), "prod".to_string());
    store.insert_instance(instance).unwrap();
    store
        .replace_domain_mappings(
            INSTANCE_ID,
            vec![
                DomainAttachment {
                    domain_id: 1,
                    subdomain: None,
                    is_primary: true,
                },
                DomainAttachment {
                    domain_id: 2,
                    subdomain: Some("api".to_string()),
                    is_primary: false,
                },
            ],
        )
        .await
        .unwrap();

    let dns = Arc::new(dns);
    let runtime = Arc::new(runtime);
    let data_root = TempDir::new().unwrap();
    let executor = ExecutionClient::new(runtime.clone(), Duration::from_secs(2)).unwrap();
    let options = EngineOptions {
        data: DataLayout::new(data_root.path()),
        ..Default::default()
    };
    let engine = DeploymentEngine::new(store.clone(), dns.clone(), executor, options);

    Fixture {
        store,
        dns,
        runtime,
        engine,
        data_root,
    }
}
