//! Agent sidecar routes

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use kws_engine::server::{router, AgentState};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::FakeRuntime;

const TOKEN: &str = "s3cret";

fn app(runtime: FakeRuntime) -> (Router, Arc<FakeRuntime>) {
    let runtime = Arc::new(runtime);
    let state = Arc::new(AgentState::new(
        runtime.clone(),
        Some(SecretString::from(TOKEN.to_string())),
        "edge-1",
    ));
    (router(state), runtime)
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Agent-Token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (app, _) = app(FakeRuntime::default());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok", "name": "edge-1"}));
}

#[tokio::test]
async fn test_writes_require_token() {
    let (app, runtime) = app(FakeRuntime::with_container("web"));

    for token in [None, Some("wrong")] {
        let response = app
            .clone()
            .oneshot(post("/docker/stop", token, json!({"container": "web"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"detail": "Unauthorized"}));
    }
    assert_eq!(runtime.stops.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_requires_container() {
    let (app, _) = app(FakeRuntime::default());
    let response = app
        .oneshot(post("/docker/stop", Some(TOKEN), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"detail": "container required"}));
}

#[tokio::test]
async fn test_missing_container_detail() {
    let (app, _) = app(FakeRuntime::default());
    let response = app
        .oneshot(post("/docker/remove", Some(TOKEN), json!({"container": "ghost"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "No such container: ghost");
}

#[tokio::test]
async fn test_run_then_stop() {
    let (app, runtime) = app(FakeRuntime::default());

    let response = app
        .clone()
        .oneshot(post(
            "/docker/run",
            Some(TOKEN),
            json!({"image": "nginx:latest", "name": "web", "ports": {"80/tcp": null}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"id": "cid-1"}));

    let spec = runtime.last_spec.lock().unwrap().clone().unwrap();
    assert_eq!(spec.name, "web");
    assert_eq!(spec.ports.get("80/tcp"), Some(&None));

    let response = app
        .oneshot(post("/docker/stop", Some(TOKEN), json!({"container": "web"})))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, json!({"status": "stopped"}));
}

#[tokio::test]
async fn test_run_generates_missing_name() {
    let (app, runtime) = app(FakeRuntime::default());
    let response = app
        .oneshot(post("/docker/run", Some(TOKEN), json!({"image": "redis"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let spec = runtime.last_spec.lock().unwrap().clone().unwrap();
    assert!(spec.name.starts_with("kws-"));
}

#[tokio::test]
async fn test_logs_default_tail_without_token() {
    let (app, runtime) = app(FakeRuntime::with_container("web"));
    let response = app
        .clone()
        .oneshot(Request::get("/docker/logs?container=web").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"logs": "200 lines of web"}));
    assert_eq!(*runtime.last_tail.lock().unwrap(), Some(200));

    let response = app
        .oneshot(Request::get("/docker/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"detail": "container required"}));
}

#[tokio::test]
async fn test_containers_name_filter() {
    let runtime = FakeRuntime::with_container("cp-app-7");
    runtime.containers.lock().unwrap().insert("postgres".to_string());
    let (app, _) = app(runtime);

    let response = app
        .oneshot(post("/docker/containers", Some(TOKEN), json!({"filters": {"name": "cp-"}})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "cp-app-7");
}

async fn get_json(app: Router, uri: &str) -> Value {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn test_info_reports_docker_availability() {
    let (app, runtime) = app(FakeRuntime::default());

    let info = get_json(app.clone(), "/info").await;
    assert_eq!(info["docker_available"], json!(true));
    assert!(!info["hostname"].as_str().unwrap().is_empty());
    assert!(info["ip_addresses"].is_array());

    runtime.fail_list.store(true, Ordering::SeqCst);
    let info = get_json(app, "/info").await;
    assert_eq!(info["docker_available"], json!(false));
}

#[tokio::test]
async fn test_metrics_count_containers() {
    let runtime = FakeRuntime::with_container("web");
    runtime.containers.lock().unwrap().insert("db".to_string());
    let (app, runtime) = app(runtime);

    let metrics = get_json(app.clone(), "/metrics").await;
    assert_eq!(metrics["docker_running_containers"], json!(2));
    assert_eq!(metrics["docker_total_containers"], json!(2));
    assert!(metrics["memory_percent"].is_number());

    runtime.fail_list.store(true, Ordering::SeqCst);
    let metrics = get_json(app, "/metrics").await;
    assert_eq!(metrics["docker_total_containers"], json!(0));
}
