//! Default-agent endpoints: send a message and wait for the reply, list the
//! conversation, and client-driven polling for new replies.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use utoipa::{IntoParams, ToSchema};

use relay_agent::normalize::normalize_list_row;
use relay_agent::scan::{poll_new_messages, MessagePollSnapshot};
use relay_agent::{AgentMessage, ApiFlavor, NormalizedMessage, Page};

use crate::state::AppState;

use super::{agent_error, bad_request, ApiError, ApiResult, ErrorResponse};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    /// Falls back to `AGENT_NAME` on the default-agent route.
    #[serde(default)]
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        let d = Page::default();
        Page {
            limit: self.limit.unwrap_or(d.limit),
            offset: self.offset.unwrap_or(d.offset),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PollQuery {
    /// ISO-8601 timestamp of the user message; no offset means UTC.
    pub after: Option<String>,
    /// Replies the client already holds.
    #[serde(default)]
    pub count: usize,
}

/// Conversation rows in the shape the configured upstream flavor produces.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ConversationRows {
    Normalized(Vec<NormalizedMessage>),
    Raw(Vec<AgentMessage>),
}

/// Submit `content` to `agent` and wait for the final reply.
pub(crate) async fn relay_message(
    state: &AppState,
    agent: &str,
    content: &str,
) -> ApiResult<NormalizedMessage> {
    let poller = state.poller().map_err(agent_error)?;
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("relay", %request_id, agent);

    poller
        .submit_and_await(agent, content, &state.poll)
        .instrument(span)
        .await
        .map(Json)
        .map_err(agent_error)
}

pub(crate) async fn list_conversation(
    state: &AppState,
    agent: &str,
    page: Page,
) -> Result<ConversationRows, ApiError> {
    let transport = state.transport().map_err(agent_error)?;
    match state.poll.flavor {
        ApiFlavor::Responses => {
            let rows = transport
                .list_responses(agent, page)
                .await
                .map_err(agent_error)?;
            Ok(ConversationRows::Normalized(
                rows.iter().map(normalize_list_row).collect(),
            ))
        }
        ApiFlavor::Messages => {
            let rows = transport
                .list_messages(agent, Some(page))
                .await
                .map_err(agent_error)?;
            Ok(ConversationRows::Raw(rows))
        }
    }
}

/// Send a message to the default agent
///
/// Blocks until the agent produces its final reply, fails, or the poll
/// budget runs out.
#[utoipa::path(
    post,
    path = "/api/agent/messages",
    tag = "Agent",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Normalized agent reply", body = Object),
        (status = 400, description = "Empty content", body = ErrorResponse),
        (status = 408, description = "Agent did not finish in time", body = ErrorResponse),
        (status = 409, description = "Agent busy after all submit retries", body = ErrorResponse),
        (status = 500, description = "Not configured or agent failed", body = ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<NormalizedMessage> {
    let agent = state
        .resolve_agent(req.agent_name.as_deref())
        .map_err(agent_error)?;
    relay_message(&state, &agent, &req.content).await
}

/// List the default agent's conversation
#[utoipa::path(
    get,
    path = "/api/agent/messages",
    tag = "Agent",
    params(PageQuery),
    responses(
        (status = 200, description = "Conversation rows", body = Object),
        (status = 500, description = "Not configured", body = ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ConversationRows> {
    let agent = state.resolve_agent(None).map_err(agent_error)?;
    list_conversation(&state, &agent, query.page()).await.map(Json)
}

/// Replies from the default agent the client has not seen yet
#[utoipa::path(
    get,
    path = "/api/agent/poll",
    tag = "Agent",
    params(PollQuery),
    responses(
        (status = 200, description = "New replies since `after`", body = Object),
        (status = 400, description = "Missing or malformed `after`", body = ErrorResponse),
        (status = 500, description = "Not configured", body = ErrorResponse)
    )
)]
pub async fn poll(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PollQuery>,
) -> ApiResult<MessagePollSnapshot> {
    let agent = state.resolve_agent(None).map_err(agent_error)?;
    let transport = state.transport().map_err(agent_error)?;
    let after = query
        .after
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request("Missing after parameter"))?;

    poll_new_messages(transport, &agent, after, query.count)
        .await
        .map(Json)
        .map_err(agent_error)
}
