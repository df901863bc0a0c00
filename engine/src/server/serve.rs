//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use agent_protocol::{
    CONTAINERS_PATH, INFO_PATH, LOGS_PATH, METRICS_PATH, REMOVE_PATH, RUN_PATH, STOP_PATH,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::EngineError;
use crate::server::auth::require_token;
use crate::server::handlers::{
    containers_handler, health_handler, info_handler, logs_handler, metrics_handler,
    remove_handler, run_handler, stop_handler, version_handler,
};
use crate::server::state::AgentState;

/// Listen address of the sidecar
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

/// The sidecar routes with token check and request tracing
pub fn router(state: Arc<AgentState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Host
        .route(INFO_PATH, get(info_handler))
        .route(METRICS_PATH, get(metrics_handler))
        // Containers
        .route(RUN_PATH, post(run_handler))
        .route(STOP_PATH, post(stop_handler))
        .route(REMOVE_PATH, post(remove_handler))
        .route(LOGS_PATH, get(logs_handler))
        .route(CONTAINERS_PATH, post(containers_handler))
        // State and middleware
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<AgentState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), EngineError>>, EngineError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting agent HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| EngineError::ServerError(e.to_string()))
    });

    Ok(handle)
}
