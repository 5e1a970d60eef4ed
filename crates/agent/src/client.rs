//! reqwest-backed client for the remote agent REST API.
//!
//! Every call carries the bearer token; non-2xx replies become
//! [`AgentError::Upstream`] with the best message the body offers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use relay_core::config::AgentServiceConfig;

use crate::error::AgentError;
use crate::transport::AgentTransport;
use crate::types::{
    AgentList, AgentMessage, CreateResponseRequest, Page, PendingResponse, RemixRequest,
};

pub struct HttpAgentClient {
    base_url: Url,
    bearer_token: String,
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, bearer_token: String, timeout: Duration) -> Result<Self, AgentError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::InvalidRequest(format!("invalid agent API base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::InvalidRequest(format!(
                "agent API base URL cannot carry paths: {base_url}"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            bearer_token,
            client,
        })
    }

    /// Build the client from config; fails when the bearer token is missing.
    pub fn from_config(config: &AgentServiceConfig) -> Result<Self, AgentError> {
        let token = config.require_token()?.to_string();
        Self::new(&config.base_url, token, config.request_timeout())
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn agent_endpoint(&self, agent: &str, rest: &[&str]) -> Url {
        self.endpoint(["agents", agent].into_iter().chain(rest.iter().copied()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.bearer_token)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AgentError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "agent service replied");
        if status.is_success() {
            Ok(response)
        } else {
            Err(upstream_error(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AgentError> {
        let response = self.send(builder).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AgentError::Decode(e.to_string()))
    }
}

/// Turn a non-2xx reply into an error, preferring the body's `message`, then
/// `error`, then `HTTP {code}: {reason}`.
async fn upstream_error(response: Response) -> AgentError {
    let status = response.status();
    let fallback = format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    let body = response.text().await.unwrap_or_default();
    AgentError::Upstream {
        status: status.as_u16(),
        message: message_from_body(&body).unwrap_or(fallback),
    }
}

fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl AgentTransport for HttpAgentClient {
    async fn create_response(
        &self,
        agent: &str,
        request: &CreateResponseRequest,
    ) -> Result<PendingResponse, AgentError> {
        let url = self.agent_endpoint(agent, &["responses"]);
        self.send_json(self.client.post(url).json(request)).await
    }

    async fn get_response(&self, agent: &str, id: &str) -> Result<PendingResponse, AgentError> {
        let url = self.agent_endpoint(agent, &["responses", id]);
        self.send_json(self.client.get(url)).await
    }

    async fn list_responses(
        &self,
        agent: &str,
        page: Page,
    ) -> Result<Vec<PendingResponse>, AgentError> {
        let url = self.agent_endpoint(agent, &["responses"]);
        let query = [("limit", page.limit), ("offset", page.offset)];
        self.send_json(self.client.get(url).query(&query)).await
    }

    async fn post_message(&self, agent: &str, content: &str) -> Result<AgentMessage, AgentError> {
        let url = self.agent_endpoint(agent, &["messages"]);
        let body = json!({ "role": "user", "content": content });
        self.send_json(self.client.post(url).json(&body)).await
    }

    async fn list_messages(
        &self,
        agent: &str,
        page: Option<Page>,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        let url = self.agent_endpoint(agent, &["messages"]);
        let mut builder = self.client.get(url);
        if let Some(page) = page {
            builder = builder.query(&[("limit", page.limit), ("offset", page.offset)]);
        }
        self.send_json(builder).await
    }

    async fn remix(
        &self,
        parent: &str,
        request: &RemixRequest,
    ) -> Result<serde_json::Value, AgentError> {
        let url = self.agent_endpoint(parent, &["remix"]);
        self.send_json(self.client.post(url).json(request)).await
    }

    async fn wake(&self, agent: &str, prompt: Option<&str>) -> Result<serde_json::Value, AgentError> {
        let url = self.agent_endpoint(agent, &["wake"]);
        let body = match prompt {
            Some(prompt) => json!({ "prompt": prompt }),
            None => json!({}),
        };
        self.send_json(self.client.post(url).json(&body)).await
    }

    async fn get_agent(&self, agent: &str) -> Result<serde_json::Value, AgentError> {
        let url = self.agent_endpoint(agent, &[]);
        self.send_json(self.client.get(url)).await
    }

    async fn list_agents(&self, query: &str, limit: u32) -> Result<AgentList, AgentError> {
        let url = self.endpoint(["agents"]);
        let limit = limit.to_string();
        self.send_json(self.client.get(url).query(&[("q", query), ("limit", limit.as_str())]))
            .await
    }

    async fn read_file(&self, agent: &str, path: &str) -> Result<String, AgentError> {
        let mut rest = vec!["files", "read"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = self.agent_endpoint(agent, &rest);
        let response = self.send(self.client.get(url)).await?;
        Ok(response.text().await?)
    }
}
