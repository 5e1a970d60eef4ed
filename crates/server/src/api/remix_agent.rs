//! Named-agent endpoints: messaging any agent, remixing a parent into
//! session agents, waking, state, listing and workspace file reads.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use relay_agent::remix::{self, AgentFile, AgentListing, RemixOutcome};
use relay_agent::NormalizedMessage;

use crate::state::AppState;

use super::agent::{list_conversation, relay_message, ConversationRows, PageQuery};
use super::{agent_error, bad_request, ApiResult, ErrorResponse};

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, super::ApiError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request(message))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemixMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AgentMessagesQuery {
    pub agent: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemixBody {
    #[serde(default)]
    pub parent_agent_name: Option<String>,
    #[serde(default)]
    pub new_agent_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WakeBody {
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StateQuery {
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAgentsQuery {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FileQuery {
    pub agent: Option<String>,
    /// Defaults to `AGENT_DEFAULT_FILE_PATH`.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    #[serde(default)]
    pub base_agent_name: Option<String>,
}

/// Send a message to a named agent
#[utoipa::path(
    post,
    path = "/api/remix-agent/messages",
    tag = "Remix Agent",
    request_body = RemixMessageRequest,
    responses(
        (status = 200, description = "Normalized agent reply", body = Object),
        (status = 400, description = "Missing agentName or content", body = ErrorResponse),
        (status = 408, description = "Agent did not finish in time", body = ErrorResponse),
        (status = 409, description = "Agent busy after all submit retries", body = ErrorResponse),
        (status = 500, description = "Not configured or agent failed", body = ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemixMessageRequest>,
) -> ApiResult<NormalizedMessage> {
    state.transport().map_err(agent_error)?;
    let agent = required(req.agent_name.as_deref(), "agentName is required")?;
    relay_message(&state, agent, &req.content).await
}

/// List a named agent's conversation
#[utoipa::path(
    get,
    path = "/api/remix-agent/messages",
    tag = "Remix Agent",
    params(AgentMessagesQuery),
    responses(
        (status = 200, description = "Conversation rows", body = Object),
        (status = 400, description = "Missing agent", body = ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgentMessagesQuery>,
) -> ApiResult<ConversationRows> {
    let agent = required(query.agent.as_deref(), "agent parameter is required")?;
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .page();
    list_conversation(&state, agent, page).await.map(Json)
}

/// Clone a parent agent under a new name
#[utoipa::path(
    post,
    path = "/api/remix-agent/remix",
    tag = "Remix Agent",
    request_body = RemixBody,
    responses(
        (status = 200, description = "Remix created", body = Object),
        (status = 400, description = "Missing names", body = ErrorResponse)
    )
)]
pub async fn remix(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RemixBody>,
) -> ApiResult<RemixOutcome> {
    let transport = state.transport().map_err(agent_error)?;
    let message = "parentAgentName and newAgentName are required";
    let parent = required(body.parent_agent_name.as_deref(), message)?;
    let new_name = required(body.new_agent_name.as_deref(), message)?;

    remix::remix(transport, parent, new_name)
        .await
        .map(Json)
        .map_err(agent_error)
}

/// Wake a sleeping agent
#[utoipa::path(
    post,
    path = "/api/remix-agent/wake",
    tag = "Remix Agent",
    request_body = WakeBody,
    responses(
        (status = 200, description = "Upstream wake result", body = Object),
        (status = 400, description = "Missing agentName", body = ErrorResponse)
    )
)]
pub async fn wake(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WakeBody>,
) -> ApiResult<serde_json::Value> {
    let agent = required(body.agent_name.as_deref(), "Agent name is required")?;
    let transport = state.transport().map_err(agent_error)?;
    let prompt = body.prompt.as_deref().filter(|p| !p.trim().is_empty());

    let result = transport.wake(agent, prompt).await.map_err(agent_error)?;
    tracing::info!(agent, "agent woken");
    Ok(Json(result))
}

/// Upstream record of an agent (includes its lifecycle state)
#[utoipa::path(
    get,
    path = "/api/remix-agent/state",
    tag = "Remix Agent",
    params(StateQuery),
    responses(
        (status = 200, description = "Upstream agent record", body = Object),
        (status = 400, description = "Missing agentName", body = ErrorResponse)
    )
)]
pub async fn agent_state(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> ApiResult<serde_json::Value> {
    let agent = required(query.agent_name.as_deref(), "Agent name is required")?;
    let transport = state.transport().map_err(agent_error)?;
    transport.get_agent(agent).await.map(Json).map_err(agent_error)
}

/// Search agents by name
#[utoipa::path(
    get,
    path = "/api/remix-agent/list-agents",
    tag = "Remix Agent",
    params(ListAgentsQuery),
    responses(
        (status = 200, description = "Matching agents", body = Object)
    )
)]
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<AgentListing> {
    let transport = state.transport().map_err(agent_error)?;
    remix::list_agents(transport, query.prefix.trim())
        .await
        .map(Json)
        .map_err(agent_error)
}

/// Read an HTML file from an agent's workspace
#[utoipa::path(
    get,
    path = "/api/remix-agent/files",
    tag = "Remix Agent",
    params(FileQuery),
    responses(
        (status = 200, description = "File content", body = Object),
        (status = 400, description = "Missing agent", body = ErrorResponse)
    )
)]
pub async fn read_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<AgentFile> {
    let agent = required(query.agent.as_deref(), "agent parameter is required")?;
    let transport = state.transport().map_err(agent_error)?;
    let path = query
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&state.config.agent.default_file_path);

    remix::read_file(transport, agent, path)
        .await
        .map(Json)
        .map_err(agent_error)
}

/// Remix the base agent into the next free numbered session agent
#[utoipa::path(
    post,
    path = "/api/remix-agent/session",
    tag = "Remix Agent",
    request_body = SessionBody,
    responses(
        (status = 200, description = "Session agent created", body = Object),
        (status = 400, description = "Missing baseAgentName", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionBody>,
) -> ApiResult<RemixOutcome> {
    let base = required(body.base_agent_name.as_deref(), "baseAgentName is required")?;
    let transport = state.transport().map_err(agent_error)?;
    remix::create_session_agent(transport, base)
        .await
        .map(Json)
        .map_err(agent_error)
}
