//! Agent token check

use std::sync::Arc;

use agent_protocol::{ErrorBody, AGENT_TOKEN_HEADER};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http::{Method, StatusCode};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::server::state::AgentState;

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

/// Reject mutating requests without the configured `X-Agent-Token`.
/// Reads pass through, as does everything when no token is configured.
pub async fn require_token(
    State(state): State<Arc<AgentState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.token else {
        return next.run(request).await;
    };
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }

    let given = request
        .headers()
        .get(AGENT_TOKEN_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if bool::from(expected.expose_secret().as_bytes().ct_eq(given)) {
        next.run(request).await
    } else {
        warn!("Rejected {} {}: bad agent token", request.method(), request.uri().path());
        (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response()
    }
}
