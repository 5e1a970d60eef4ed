//! Remix-agent lifecycle: cloning a parent agent into numbered session
//! agents, listing them, and reading files out of their workspace.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::transport::AgentTransport;
use crate::types::{AgentSummary, RemixRequest};

/// Upper bound the upstream accepts for `GET /agents?limit=`.
pub const AGENT_LIST_LIMIT: u32 = 1000;

const SESSION_ATTEMPTS: u32 = 3;
const SESSION_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixOutcome {
    pub success: bool,
    pub parent_agent: String,
    pub new_agent: String,
    pub agent_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentListing {
    pub agents: Vec<AgentSummary>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFile {
    pub content: String,
    pub content_type: String,
    pub path: String,
    pub agent: String,
}

fn require(value: &str, field: &str) -> Result<(), AgentError> {
    if value.trim().is_empty() {
        Err(AgentError::InvalidRequest(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Full copy of `parent` (code, secrets, content) under `new_name`.
pub async fn remix(
    transport: &dyn AgentTransport,
    parent: &str,
    new_name: &str,
) -> Result<RemixOutcome, AgentError> {
    require(parent, "parentAgent")?;
    require(new_name, "newAgentName")?;

    let agent_data = transport
        .remix(parent, &RemixRequest::full_copy(new_name))
        .await?;
    info!(parent_agent = parent, new_agent = new_name, "agent remixed");
    Ok(RemixOutcome {
        success: true,
        parent_agent: parent.to_string(),
        new_agent: new_name.to_string(),
        agent_data,
    })
}

/// Agents whose name matches `prefix` (upstream search, not a strict prefix).
pub async fn list_agents(
    transport: &dyn AgentTransport,
    prefix: &str,
) -> Result<AgentListing, AgentError> {
    let list = transport.list_agents(prefix, AGENT_LIST_LIMIT).await?;
    Ok(AgentListing {
        agents: list.items,
        total: list.total,
    })
}

/// Read a workspace file as HTML text.
pub async fn read_file(
    transport: &dyn AgentTransport,
    agent: &str,
    path: &str,
) -> Result<AgentFile, AgentError> {
    require(agent, "agent")?;
    require(path, "path")?;

    let content = transport.read_file(agent, path).await?;
    Ok(AgentFile {
        content,
        content_type: "text/html".to_string(),
        path: path.to_string(),
        agent: agent.to_string(),
    })
}

/// Next free session name: `{base}-{max n + 1}` over names that are exactly
/// `{base}-{decimal}`, or `{base}-1` when none are.
pub fn next_remix_name<'a>(base: &str, names: impl IntoIterator<Item = &'a str>) -> String {
    let highest = names
        .into_iter()
        .filter_map(|name| name.strip_prefix(base)?.strip_prefix('-'))
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{base}-{}", highest + 1)
}

/// Remix `base` into the next numbered session agent.
///
/// Concurrent callers can race for the same number; an "already exists"
/// rejection re-lists and retries, up to three attempts in total.
pub async fn create_session_agent(
    transport: &dyn AgentTransport,
    base: &str,
) -> Result<RemixOutcome, AgentError> {
    require(base, "baseAgentName")?;

    let mut attempt = 1;
    loop {
        let listing = list_agents(transport, base).await?;
        let name = next_remix_name(base, listing.agents.iter().map(|a| a.name.as_str()));

        match remix(transport, base, &name).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < SESSION_ATTEMPTS && e.to_string().contains("already exists") => {
                warn!(base_agent = base, new_agent = %name, attempt, "session name taken, retrying");
                tokio::time::sleep(SESSION_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
