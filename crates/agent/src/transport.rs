use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{
    AgentList, AgentMessage, CreateResponseRequest, Page, PendingResponse, RemixRequest,
};

/// The upstream agent service as the relay sees it.
///
/// [`crate::client::HttpAgentClient`] is the production implementation; tests
/// drive the poller through [`crate::mock::ScriptedTransport`].
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// `POST /agents/{agent}/responses`
    async fn create_response(
        &self,
        agent: &str,
        request: &CreateResponseRequest,
    ) -> Result<PendingResponse, AgentError>;

    /// `GET /agents/{agent}/responses/{id}`
    async fn get_response(&self, agent: &str, id: &str) -> Result<PendingResponse, AgentError>;

    /// `GET /agents/{agent}/responses?limit&offset`
    async fn list_responses(&self, agent: &str, page: Page)
        -> Result<Vec<PendingResponse>, AgentError>;

    /// `POST /agents/{agent}/messages` with a user message.
    async fn post_message(&self, agent: &str, content: &str) -> Result<AgentMessage, AgentError>;

    /// `GET /agents/{agent}/messages`, optionally paged.
    async fn list_messages(
        &self,
        agent: &str,
        page: Option<Page>,
    ) -> Result<Vec<AgentMessage>, AgentError>;

    /// `POST /agents/{parent}/remix`
    async fn remix(&self, parent: &str, request: &RemixRequest)
        -> Result<serde_json::Value, AgentError>;

    /// `POST /agents/{agent}/wake`
    async fn wake(&self, agent: &str, prompt: Option<&str>) -> Result<serde_json::Value, AgentError>;

    /// `GET /agents/{agent}`
    async fn get_agent(&self, agent: &str) -> Result<serde_json::Value, AgentError>;

    /// `GET /agents?q={query}&limit={limit}`
    async fn list_agents(&self, query: &str, limit: u32) -> Result<AgentList, AgentError>;

    /// `GET /agents/{agent}/files/read/{path}`, returned as text.
    async fn read_file(&self, agent: &str, path: &str) -> Result<String, AgentError>;
}
