//! Agent-backed container runtime
//!
//! Talks to the per-server agent over HTTP. Every call is bounded by the
//! client's timeout and fails with a classified `ContainerError`.

use agent_protocol::{
    ContainerRequest, ContainerSummary, ContainersRequest, ErrorBody, LogsResponse, RunResponse,
    StatusResponse, AGENT_TOKEN_HEADER, CONTAINERS_PATH, LOGS_PATH, REMOVE_PATH, RUN_PATH,
    STOP_PATH,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::ContainerError;
use crate::models::Server;
use crate::runtime::{ContainerRuntime, RunSpec};

/// Container runtime reached through a server's agent
pub struct AgentRuntime {
    client: Client,
    base_url: String,
    server_name: String,
    token: Option<SecretString>,
}

impl AgentRuntime {
    /// Build a runtime for a server, validating its agent URL
    pub fn for_server(client: Client, server: &Server) -> Result<Self, ContainerError> {
        let raw_url = server
            .agent_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ContainerError::InvalidAgentUrl {
                url: String::new(),
                reason: format!("agent URL not configured for server {}", server.name),
            })?;

        url::Url::parse(raw_url).map_err(|e| ContainerError::InvalidAgentUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: raw_url.trim_end_matches('/').to_string(),
            server_name: server.name.clone(),
            token: server.agent_token.clone(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AGENT_TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ContainerError> {
        let url = self.url(path);
        debug!("POST {} (agent {})", url, self.server_name);

        let request = self.authorize(self.client.post(&url).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| ContainerError::from_transport(&url, e))?;
        self.decode(&url, response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ContainerError> {
        let url = self.url(path);
        debug!("GET {} (agent {})", url, self.server_name);

        let request = self.authorize(self.client.get(&url).query(query));
        let response = request
            .send()
            .await
            .map_err(|e| ContainerError::from_transport(&url, e))?;
        self.decode(&url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        url: &str,
        response: Response,
    ) -> Result<T, ContainerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .map(|b| b.detail_text());
            error!(
                "Agent {} request {} failed: {} - {}",
                self.server_name, url, status, body
            );
            return Err(ContainerError::Agent {
                status: status.as_u16(),
                detail,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ContainerError::from_transport(url, e))
    }
}

#[async_trait]
impl ContainerRuntime for AgentRuntime {
    async fn run(&self, spec: &RunSpec) -> Result<String, ContainerError> {
        let response: RunResponse = self.post(RUN_PATH, &spec.to_request()).await?;
        response
            .id
            .filter(|id| !id.is_empty())
            .ok_or(ContainerError::MissingContainerId)
    }

    async fn stop(&self, container: &str) -> Result<(), ContainerError> {
        let _: StatusResponse = self.post(STOP_PATH, &ContainerRequest::new(container)).await?;
        Ok(())
    }

    async fn remove(&self, container: &str) -> Result<(), ContainerError> {
        let _: StatusResponse = self
            .post(REMOVE_PATH, &ContainerRequest::new(container))
            .await?;
        Ok(())
    }

    async fn logs(&self, container: &str, tail: u32) -> Result<String, ContainerError> {
        let query = [("container", container.to_string()), ("tail", tail.to_string())];
        let response: LogsResponse = self.get(LOGS_PATH, &query).await?;
        Ok(response.logs)
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.post(CONTAINERS_PATH, &ContainersRequest::default()).await
    }
}
