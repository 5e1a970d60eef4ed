use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle label of an upstream response resource.
///
/// Upstream versions disagree on the exact vocabulary, so unknown labels are
/// kept verbatim in [`ResponseStatus::Other`]. Only `Completed` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl ResponseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResponseStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" | "pending" => Self::Queued,
            "in_progress" | "processing" | "running" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<ResponseStatus> for String {
    fn from(s: ResponseStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept a string, treat anything else (numbers, objects, null) as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Accept an array, treat `null` as empty.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A typed content item in `input_content` / `output_content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ContentItem {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

/// Older upstream output shape: a list of `{type, text}` segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
}

/// An upstream response resource as observed by the poller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub id: String,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub output_content: Vec<ContentItem>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub input_content: Vec<ContentItem>,
    #[serde(default, deserialize_with = "lenient_vec", skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// A row of the legacy `/agents/{name}/messages` API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: MessageId,
    #[serde(default)]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
}

/// Message identifier as the UI sees it: numeric when derivable, else opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Agent,
    System,
}

impl Role {
    /// Map an upstream role label, defaulting to `Agent` for unknown labels.
    pub fn from_label(label: &str) -> Self {
        match label {
            "user" => Self::User,
            "system" => Self::System,
            _ => Self::Agent,
        }
    }
}

/// The single message shape the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// Body of `POST /agents/{name}/responses`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateResponseRequest {
    pub input: ResponseInput,
    pub background: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseInput {
    pub content: Vec<ContentItem>,
}

impl CreateResponseRequest {
    pub fn text(message: &str, background: bool) -> Self {
        Self {
            input: ResponseInput {
                content: vec![ContentItem::text(message)],
            },
            background,
        }
    }
}

/// Body of `POST /agents/{parent}/remix`.
#[derive(Debug, Clone, Serialize)]
pub struct RemixRequest {
    pub name: String,
    pub code: bool,
    pub secrets: bool,
    pub content: bool,
}

impl RemixRequest {
    /// Full copy of the parent: code, secrets and workspace content.
    pub fn full_copy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: true,
            secrets: true,
            content: true,
        }
    }
}

/// Page of `GET /agents?q=...`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentList {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub items: Vec<AgentSummary>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `limit` / `offset` for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_aliases_and_unknown_labels() {
        let s: ResponseStatus = serde_json::from_value(json!("processing")).unwrap();
        assert_eq!(s, ResponseStatus::InProgress);
        let s: ResponseStatus = serde_json::from_value(json!("pending")).unwrap();
        assert_eq!(s, ResponseStatus::Queued);
        let s: ResponseStatus = serde_json::from_value(json!("paused")).unwrap();
        assert_eq!(s, ResponseStatus::Other("paused".into()));
        assert!(!s.is_terminal());
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("paused"));
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(ResponseStatus::Completed.is_terminal());
        assert!(ResponseStatus::Failed.is_terminal());
        assert!(!ResponseStatus::Queued.is_terminal());
        assert!(!ResponseStatus::InProgress.is_terminal());
    }

    #[test]
    fn pending_response_decodes_leniently() {
        let raw = json!({
            "id": "abc",
            "status": "completed",
            "output_content": [
                { "type": "text", "content": 42 },
                { "type": "url", "title": "Report", "url": "http://x" }
            ],
            "input_content": null,
            "metadata": { "tokens": 10 }
        });
        let resp: PendingResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.status, ResponseStatus::Completed);
        assert_eq!(resp.output_content.len(), 2);
        assert_eq!(resp.output_content[0].content, None);
        assert_eq!(resp.output_content[1].url.as_deref(), Some("http://x"));
        assert!(resp.input_content.is_empty());
        assert!(resp.created_at.is_none());
    }

    #[test]
    fn missing_status_defaults_to_queued() {
        let resp: PendingResponse = serde_json::from_value(json!({ "id": "abc" })).unwrap();
        assert_eq!(resp.status, ResponseStatus::Queued);
        assert_eq!(ResponseStatus::default(), ResponseStatus::Queued);
    }

    #[test]
    fn create_request_wire_shape() {
        let body = serde_json::to_value(CreateResponseRequest::text("hi", true)).unwrap();
        assert_eq!(
            body,
            json!({
                "input": { "content": [ { "type": "text", "content": "hi" } ] },
                "background": true
            })
        );
    }

    #[test]
    fn message_id_is_untagged() {
        assert_eq!(serde_json::to_value(MessageId::Number(7)).unwrap(), json!(7));
        let id: MessageId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(id, MessageId::Text("abc".into()));
    }

    #[test]
    fn role_accepts_assistant_alias() {
        let r: Role = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(r, Role::Agent);
        assert_eq!(Role::from_label("robot"), Role::Agent);
        assert_eq!(Role::from_label("user"), Role::User);
    }
}
