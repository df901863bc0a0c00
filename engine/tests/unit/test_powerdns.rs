//! PowerDNS provider and settings-wired engine against a mock PowerDNS API

use std::sync::atomic::Ordering;
use std::sync::Arc;

use kws_engine::deploy::{AppStatus, DeploymentEngine, InstanceStore, MemoryStore};
use kws_engine::dns::{DnsProvider, PowerDnsProvider};
use kws_engine::dns::records::{DnsRecord, RecordType};
use kws_engine::errors::EngineError;
use kws_engine::models::{AppInstance, Domain, DomainAttachment, Server};
use kws_engine::storage::settings::Settings;
use secrecy::SecretString;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::FakeRuntime;

const ZONES: &str = "/api/v1/servers/localhost/zones";
const ZONE: &str = "/api/v1/servers/localhost/zones/a.com.";

fn provider(mock: &MockServer) -> PowerDnsProvider {
    PowerDnsProvider::new(
        reqwest::Client::new(),
        &format!("{}/api/v1", mock.uri()),
        "localhost",
        Some(SecretString::from("pdns-key".to_string())),
    )
    .unwrap()
}

async fn mount_missing_zone(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path(ZONE))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not Found"})))
        .mount(mock)
        .await;
    Mock::given(method("POST"))
        .and(path(ZONES))
        .and(body_partial_json(json!({"name": "a.com.", "kind": "Native"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a.com."})))
        .expect(1)
        .mount(mock)
        .await;
}

#[tokio::test]
async fn test_missing_zone_is_created() {
    let mock = MockServer::start().await;
    mount_missing_zone(&mock).await;

    provider(&mock)
        .ensure_zone(&Domain::new(1, "a.com", "powerdns"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_existing_zone_is_left_alone() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ZONE))
        .and(header("X-API-Key", "pdns-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "a.com."})))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock)
        .await;

    provider(&mock)
        .ensure_zone(&Domain::new(1, "a.com", "powerdns"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upsert_replaces_rrset() {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(ZONE))
        .and(body_partial_json(json!({"rrsets": [{
            "name": "api.a.com.",
            "type": "CNAME",
            "changetype": "REPLACE",
            "ttl": 300,
            "records": [{"content": "a.com", "disabled": false}]
        }]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let domain = Domain::new(1, "a.com", "powerdns");
    let record = DnsRecord::new(&domain, RecordType::Cname, "api", "a.com");
    provider(&mock).upsert_record(&domain, &record).await.unwrap();
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(422).set_body_string("RRset api.a.com. IN CNAME: conflicts"))
        .mount(&mock)
        .await;

    let domain = Domain::new(1, "a.com", "powerdns");
    let record = DnsRecord::new(&domain, RecordType::Cname, "api", "a.com");
    let err = provider(&mock).upsert_record(&domain, &record).await.unwrap_err();

    assert!(matches!(err, EngineError::DnsError(_)));
    assert!(err.to_string().contains("422"));
    assert!(err.to_string().contains("conflicts"));
}

struct SettingsFixture {
    store: Arc<MemoryStore>,
    runtime: Arc<FakeRuntime>,
    engine: DeploymentEngine,
    data_root: TempDir,
}

/// Instance 7 on the master server, routed at `a.com` and `api.a.com`
async fn engine_from_settings(mock: &MockServer) -> SettingsFixture {
    let store = Arc::new(MemoryStore::new());
    store.insert_application(1).unwrap();
    store.insert_server(Server::master(1, "master")).unwrap();
    store.insert_domain(Domain::new(1, "a.com", "PowerDNS")).unwrap();
    store
        .insert_instance(AppInstance::new(7, 1, 1, "Shop", "cp-app-7", "nginx:latest"))
        .unwrap();
    store
        .replace_domain_mappings(
            7,
            vec![
                DomainAttachment {
                    domain_id: 1,
                    subdomain: None,
                    is_primary: true,
                },
                DomainAttachment {
                    domain_id: 1,
                    subdomain: Some("api".to_string()),
                    is_primary: false,
                },
            ],
        )
        .await
        .unwrap();

    let data_root = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.engine.data_root = data_root.path().to_path_buf();
    settings.engine.shared_network = "kws-net".to_string();
    settings.dns.ipv4 = "203.0.113.10".to_string();
    settings.dns.powerdns_url = format!("{}/api/v1", mock.uri());
    settings.dns.powerdns_api_key = Some(SecretString::from("pdns-key".to_string()));

    let runtime = Arc::new(FakeRuntime::default());
    let engine = DeploymentEngine::from_settings(store.clone(), runtime.clone(), &settings).unwrap();

    SettingsFixture {
        store,
        runtime,
        engine,
        data_root,
    }
}

#[tokio::test]
async fn test_engine_from_settings_deploys_through_powerdns() {
    let mock = MockServer::start().await;
    mount_missing_zone(&mock).await;
    Mock::given(method("PATCH"))
        .and(path(ZONE))
        .and(header("X-API-Key", "pdns-key"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock)
        .await;

    let fx = engine_from_settings(&mock).await;
    assert_eq!(fx.engine.options().shared_network, "kws-net");
    assert_eq!(fx.engine.options().data.data_root, fx.data_root.path());

    let deployment = fx.engine.deploy(7).await.unwrap();
    assert_eq!(deployment.status, AppStatus::Running);
    assert_eq!(fx.store.status_of(7), Some(AppStatus::Running));

    let spec = fx.runtime.last_spec.lock().unwrap().clone().unwrap();
    assert_eq!(spec.networks, vec!["kws-net"]);

    let rrsets: Vec<Value> = mock
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap()["rrsets"][0].clone())
        .collect();
    assert_eq!(rrsets[0]["name"], "a.com.");
    assert_eq!(rrsets[0]["type"], "A");
    assert_eq!(rrsets[0]["records"][0]["content"], "203.0.113.10");
    assert_eq!(rrsets[1]["name"], "api.a.com.");
    assert_eq!(rrsets[1]["type"], "CNAME");
}

#[tokio::test]
async fn test_powerdns_failure_aborts_deploy() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ZONE))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&mock)
        .await;

    let fx = engine_from_settings(&mock).await;
    let err = fx.engine.deploy(7).await.unwrap_err();

    assert!(matches!(err, EngineError::DnsProvisioning(_)));
    assert!(err.to_string().contains("a.com"));
    assert_eq!(fx.runtime.runs.load(Ordering::SeqCst), 0);
    assert_eq!(fx.store.status_of(7), Some(AppStatus::Error));
}
