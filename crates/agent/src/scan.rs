//! Scans over the legacy message list: the agent's replies after a given
//! user message, and the incremental view the dashboard polls.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::error::AgentError;
use crate::transport::AgentTransport;
use crate::types::AgentMessage;

/// RFC 3339, or an ISO-8601 date-time without offset read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// Agent-authored messages strictly newer than `after`, oldest first.
/// Rows with an unparsable `created_at` are dropped.
pub fn agent_replies_after(
    messages: Vec<AgentMessage>,
    after: &DateTime<FixedOffset>,
) -> Vec<AgentMessage> {
    let mut replies: Vec<(DateTime<FixedOffset>, AgentMessage)> = messages
        .into_iter()
        .filter(|m| m.role == "agent")
        .filter_map(|m| parse_timestamp(&m.created_at).map(|ts| (ts, m)))
        .filter(|(ts, _)| ts > after)
        .collect();
    replies.sort_by_key(|(ts, _)| *ts);
    replies.into_iter().map(|(_, m)| m).collect()
}

/// What `GET /api/agent/poll` returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePollSnapshot {
    /// Replies the caller has not seen yet.
    pub responses: Vec<AgentMessage>,
    /// All replies after the user message.
    pub total_count: usize,
    pub has_new_responses: bool,
}

/// One round of client-driven polling: list messages once and return the
/// replies beyond the `known_count` the caller already holds.
pub async fn poll_new_messages(
    transport: &dyn AgentTransport,
    agent: &str,
    after: &str,
    known_count: usize,
) -> Result<MessagePollSnapshot, AgentError> {
    let after_ts = parse_timestamp(after)
        .ok_or_else(|| AgentError::InvalidRequest(format!("after is not an ISO-8601 timestamp: {after}")))?;

    let messages = transport.list_messages(agent, None).await?;
    let replies = agent_replies_after(messages, &after_ts);
    let total_count = replies.len();
    let responses: Vec<AgentMessage> = replies.into_iter().skip(known_count).collect();
    debug!(agent, total_count, new = responses.len(), "message poll");

    Ok(MessagePollSnapshot {
        has_new_responses: !responses.is_empty(),
        total_count,
        responses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use crate::types::MessageId;

    fn msg(id: u64, role: &str, created_at: &str) -> AgentMessage {
        AgentMessage {
            id: MessageId::Number(id),
            role: role.to_string(),
            content: Some(format!("m{id}")),
            metadata: serde_json::Value::Null,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn replies_are_filtered_and_sorted() {
        let after = parse_timestamp("2025-03-01T10:00:00Z").unwrap();
        let messages = vec![
            msg(4, "agent", "2025-03-01T10:00:09Z"),
            msg(1, "agent", "2025-03-01T09:00:00Z"),
            msg(2, "user", "2025-03-01T10:00:05Z"),
            msg(3, "agent", "2025-03-01T10:00:03+00:00"),
            msg(5, "agent", "not a date"),
            msg(6, "agent", "2025-03-01T10:00:00Z"),
        ];
        let ids: Vec<_> = agent_replies_after(messages, &after)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![MessageId::Number(3), MessageId::Number(4)]);
    }

    #[test]
    fn offsets_are_compared_as_instants() {
        let after = parse_timestamp("2025-03-01T12:00:00+02:00").unwrap();
        let messages = vec![msg(1, "agent", "2025-03-01T10:00:01Z")];
        assert_eq!(agent_replies_after(messages, &after).len(), 1);
    }

    #[test]
    fn timestamps_without_offset_are_utc() {
        let naive = parse_timestamp("2025-03-01T10:00:00.123456").unwrap();
        let zoned = parse_timestamp("2025-03-01T10:00:00.123456Z").unwrap();
        assert_eq!(naive, zoned);
        assert!(parse_timestamp("2025-03-01T10:00:00").is_some());
        assert!(parse_timestamp("2025-03-01").is_none());
    }

    #[test]
    fn replies_without_offset_are_kept() {
        let after = parse_timestamp("2025-03-01T10:00:00.123456").unwrap();
        let messages = vec![
            msg(1, "agent", "2025-03-01T09:59:59.000000"),
            msg(2, "agent", "2025-03-01T10:00:05.000000"),
        ];
        let ids: Vec<_> = agent_replies_after(messages, &after)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![MessageId::Number(2)]);
    }

    #[tokio::test]
    async fn poll_returns_only_unseen_replies() {
        let transport = ScriptedTransport::new();
        transport.queue_list_messages(Ok(vec![
            msg(1, "user", "2025-03-01T10:00:00Z"),
            msg(2, "agent", "2025-03-01T10:00:01Z"),
            msg(3, "agent", "2025-03-01T10:00:02Z"),
        ]));

        let snap = poll_new_messages(&transport, "lway", "2025-03-01T10:00:00Z", 1)
            .await
            .unwrap();
        assert_eq!(snap.total_count, 2);
        assert!(snap.has_new_responses);
        assert_eq!(snap.responses.len(), 1);
        assert_eq!(snap.responses[0].id, MessageId::Number(3));

        let body = serde_json::to_value(&snap).unwrap();
        assert_eq!(body["totalCount"], 2);
        assert_eq!(body["hasNewResponses"], true);
    }

    #[tokio::test]
    async fn poll_with_everything_known_has_nothing_new() {
        let transport = ScriptedTransport::new();
        transport.queue_list_messages(Ok(vec![msg(2, "agent", "2025-03-01T10:00:01Z")]));

        let snap = poll_new_messages(&transport, "lway", "2025-03-01T10:00:00Z", 5)
            .await
            .unwrap();
        assert_eq!(snap.total_count, 1);
        assert!(!snap.has_new_responses);
        assert!(snap.responses.is_empty());
    }

    #[tokio::test]
    async fn poll_rejects_bad_after() {
        let transport = ScriptedTransport::new();
        let err = poll_new_messages(&transport, "lway", "yesterday", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        assert_eq!(transport.list_message_calls(), 0);
    }
}
