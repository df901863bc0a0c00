//! Agent-backed execution against a mock agent

use std::sync::Arc;
use std::time::Duration;

use agent_protocol::AGENT_TOKEN_HEADER;
use kws_engine::errors::{ContainerError, EngineError};
use kws_engine::models::Server;
use kws_engine::runtime::{is_missing_container, ExecutionClient, RunSpec};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::FakeRuntime;

fn client(timeout: Duration) -> (ExecutionClient, Arc<FakeRuntime>) {
    let local = Arc::new(FakeRuntime::default());
    (ExecutionClient::new(local.clone(), timeout).unwrap(), local)
}

fn agent_server(mock: &MockServer) -> Server {
    Server::remote(2, "edge-1", mock.uri()).with_agent_token("s3cret")
}

#[tokio::test]
async fn test_run_sends_token_and_spec() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/run"))
        .and(header(AGENT_TOKEN_HEADER, "s3cret"))
        .and(body_partial_json(json!({
            "image": "nginx:latest",
            "name": "cp-app-7",
            "ports": {"80/tcp": null},
            "networks": ["cp-net"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc123"})))
        .expect(1)
        .mount(&mock)
        .await;

    let (client, local) = client(Duration::from_secs(2));
    let mut spec = RunSpec {
        image: "nginx:latest".to_string(),
        name: "cp-app-7".to_string(),
        networks: vec!["cp-net".to_string()],
        ..Default::default()
    };
    spec.ports.insert("80/tcp".to_string(), None);

    let id = client.run(&agent_server(&mock), &spec).await.unwrap();
    assert_eq!(id, "abc123");
    assert_eq!(local.runs.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_master_with_agent_url_goes_through_agent() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "stopped"})))
        .expect(1)
        .mount(&mock)
        .await;

    let (client, local) = client(Duration::from_secs(2));
    let mut master = Server::master(1, "master");
    master.agent_url = Some(mock.uri());

    client.stop(&master, "cp-app-7").await.unwrap();
    assert_eq!(local.stops.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_container_detail_is_tolerated() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/stop"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "No such container: cp-app-7"})),
        )
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let server = agent_server(&mock);

    let err = client.stop(&server, "cp-app-7").await.unwrap_err();
    match &err {
        EngineError::Container(ContainerError::Agent { status, detail, .. }) => {
            assert_eq!(*status, 400);
            assert_eq!(detail.as_deref(), Some("No such container: cp-app-7"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(is_missing_container(&err));

    assert!(!client.stop_if_present(&server, "cp-app-7").await.unwrap());
}

#[tokio::test]
async fn test_other_agent_failures_propagate() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/remove"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let err = client
        .remove_if_present(&agent_server(&mock), "cp-app-7")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn test_unauthorized_is_not_missing() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/stop"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Unauthorized"})))
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let server = Server::remote(2, "edge-1", mock.uri());
    assert!(client.stop_if_present(&server, "cp-app-7").await.is_err());
}

#[tokio::test]
async fn test_logs_query() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docker/logs"))
        .and(query_param("container", "cp-app-7"))
        .and(query_param("tail", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": "ready\n"})))
        .expect(1)
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let logs = client.logs(&agent_server(&mock), "cp-app-7", 50).await.unwrap();
    assert_eq!(logs, "ready\n");
}

#[tokio::test]
async fn test_run_without_id_fails() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let spec = RunSpec {
        image: "nginx".to_string(),
        name: "cp-app-7".to_string(),
        ..Default::default()
    };
    let err = client.run(&agent_server(&mock), &spec).await.unwrap_err();
    assert!(matches!(err, EngineError::Container(ContainerError::MissingContainerId)));
}

#[tokio::test]
async fn test_slow_agent_times_out() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/stop"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "stopped"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_millis(100));
    let err = client
        .stop_if_present(&agent_server(&mock), "cp-app-7")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Container(ContainerError::Timeout { .. })));
}

#[tokio::test]
async fn test_list_containers() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/docker/containers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "abc", "name": "cp-app-7", "image": "nginx", "status": "running"}
        ])))
        .mount(&mock)
        .await;

    let (client, _) = client(Duration::from_secs(2));
    let containers = client.list_containers(&agent_server(&mock)).await.unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name, "cp-app-7");
}
