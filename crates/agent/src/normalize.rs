//! Shaping upstream payloads into [`NormalizedMessage`].

use crate::adapter::{self, ContentExtraction};
use crate::types::{AgentMessage, MessageId, NormalizedMessage, PendingResponse, Role};

pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "No response generated.";

/// Numeric id for the UI: the longest hex prefix of the first ten characters
/// of the dash-stripped upstream id. Ids without a hex prefix stay opaque.
pub fn derive_message_id(upstream_id: &str) -> MessageId {
    let prefix: String = upstream_id
        .chars()
        .filter(|c| *c != '-')
        .take(10)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    match u64::from_str_radix(&prefix, 16) {
        Ok(n) if !prefix.is_empty() => MessageId::Number(n),
        _ => MessageId::Text(upstream_id.to_string()),
    }
}

fn object_or_empty(value: &serde_json::Value) -> serde_json::Value {
    if value.is_object() {
        value.clone()
    } else {
        serde_json::Value::Object(Default::default())
    }
}

/// Normalize a completed response. Missing content becomes the placeholder.
pub fn normalize_response(
    response: &PendingResponse,
    extraction: ContentExtraction,
) -> NormalizedMessage {
    let content = adapter::extract_content(&response.output_content, extraction)
        .unwrap_or_else(|| EMPTY_RESPONSE_PLACEHOLDER.to_string());
    NormalizedMessage {
        id: derive_message_id(&response.id),
        role: Role::Agent,
        content,
        metadata: object_or_empty(&response.metadata),
        created_at: response.created_at.clone().unwrap_or_default(),
        agent_name: response.agent_name.clone(),
    }
}

/// Normalize one row of a response listing (either side of the exchange).
pub fn normalize_list_row(response: &PendingResponse) -> NormalizedMessage {
    NormalizedMessage {
        id: derive_message_id(&response.id),
        role: adapter::row_role(response),
        content: adapter::row_content(response),
        metadata: object_or_empty(&response.metadata),
        created_at: response.created_at.clone().unwrap_or_default(),
        agent_name: response.agent_name.clone(),
    }
}

/// Normalize a legacy message-API row.
pub fn normalize_agent_message(message: &AgentMessage, agent_name: &str) -> NormalizedMessage {
    let content = message
        .content
        .clone()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| EMPTY_RESPONSE_PLACEHOLDER.to_string());
    NormalizedMessage {
        id: message.id.clone(),
        role: Role::from_label(&message.role),
        content,
        metadata: object_or_empty(&message.metadata),
        created_at: message.created_at.clone(),
        agent_name: Some(agent_name.to_string()),
    }
}
