//! HTTP request handlers

use std::sync::Arc;

use agent_protocol::{
    ContainerRequest, ContainerSummary, ContainersRequest, ErrorBody, HealthResponse,
    InfoResponse, LogsQuery, LogsResponse, MetricsResponse, RunRequest, RunResponse,
    StatusResponse,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use tracing::{error, info, warn};

use crate::errors::ContainerError;
use crate::runtime::RunSpec;
use crate::server::state::AgentState;
use crate::telemetry::{collect_metrics, host_info};
use crate::utils::{version_info, VersionInfo};

/// Error answered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        error!("Container operation failed: {}", err);
        ApiError::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.detail))).into_response()
    }
}

fn required_container(request: ContainerRequest) -> Result<String, ApiError> {
    request
        .container
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("container required"))
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<AgentState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        name: state.server_name.clone(),
    })
}

/// Version handler
pub async fn version_handler() -> Json<VersionInfo> {
    Json(version_info())
}

/// Containers known to the runtime, or `None` when it is unreachable
async fn list_or_none(state: &AgentState) -> Option<Vec<ContainerSummary>> {
    match state.runtime.list().await {
        Ok(containers) => Some(containers),
        Err(e) => {
            warn!("Container runtime unavailable: {}", e);
            None
        }
    }
}

/// Host identity and container runtime availability
pub async fn info_handler(State(state): State<Arc<AgentState>>) -> Json<InfoResponse> {
    let host = host_info();
    Json(InfoResponse {
        hostname: host.hostname,
        os: host.os,
        ip_addresses: host.ip_addresses,
        docker_available: list_or_none(&state).await.is_some(),
    })
}

/// Host load and container counts. An unreachable runtime counts as zero
/// containers.
pub async fn metrics_handler(State(state): State<Arc<AgentState>>) -> Json<MetricsResponse> {
    let metrics = collect_metrics().await;
    let containers = list_or_none(&state).await.unwrap_or_default();

    Json(MetricsResponse {
        cpu_percent: metrics.cpu_percent,
        memory_percent: metrics.memory_percent,
        disk_percent: metrics.disk_percent,
        docker_running_containers: containers.iter().filter(|c| c.is_running()).count(),
        docker_total_containers: containers.len(),
    })
}

/// Create and start a container. Unnamed containers get a generated name.
pub async fn run_handler(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    if request.image.trim().is_empty() {
        return Err(ApiError::bad_request("image required"));
    }

    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("kws-{}", uuid::Uuid::new_v4().simple()));
    let spec = RunSpec {
        image: request.image,
        name,
        env: request.env,
        labels: request.labels,
        ports: request.ports,
        volumes: request.volumes,
        networks: request.networks,
    };

    info!("Running container {} from {}", spec.name, spec.image);
    let id = state.runtime.run(&spec).await?;
    Ok(Json(RunResponse { id: Some(id) }))
}

/// Stop a container
pub async fn stop_handler(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<ContainerRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let container = required_container(request)?;
    state.runtime.stop(&container).await?;
    Ok(Json(StatusResponse {
        status: "stopped".to_string(),
    }))
}

/// Force-remove a container
pub async fn remove_handler(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<ContainerRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let container = required_container(request)?;
    state.runtime.remove(&container).await?;
    Ok(Json(StatusResponse {
        status: "removed".to_string(),
    }))
}

/// Tail a container's logs
pub async fn logs_handler(
    State(state): State<Arc<AgentState>>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        let text = rejection.body_text();
        if text.contains("container") {
            ApiError::bad_request("container required")
        } else {
            ApiError::bad_request(text)
        }
    })?;
    if query.container.trim().is_empty() {
        return Err(ApiError::bad_request("container required"));
    }

    let logs = state.runtime.logs(&query.container, query.tail).await?;
    Ok(Json(LogsResponse { logs }))
}

/// List containers. A string `name` filter keeps names containing it.
pub async fn containers_handler(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<ContainersRequest>,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    let mut containers = state.runtime.list().await?;
    if let Some(name) = request.filters.get("name").and_then(|v| v.as_str()) {
        containers.retain(|c| c.name.contains(name));
    }
    Ok(Json(containers))
}
