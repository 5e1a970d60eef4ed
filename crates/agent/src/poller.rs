//! Submit-then-poll driver for the remote agent service.
//!
//! One call to [`ResponsePoller::submit_and_await`] runs a single request to
//! exactly one outcome:
//!
//! ```text
//! Submitting ──409 x N──▶ SubmitRejectedBusy (AgentError::UpstreamBusy)
//!     │
//!     ├──terminal──▶ Completed | Failed
//!     ▼
//! Polling ──(sleep, GET by id)──▶ Polling | Completed | Failed | TimedOut
//! ```
//!
//! Fetch failures while polling are logged and retried on the next round;
//! only running out of attempts ends the loop without a terminal status.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use relay_core::PollConfig;

use crate::adapter::{ApiFlavor, ContentExtraction};
use crate::error::AgentError;
use crate::normalize::{normalize_agent_message, normalize_response};
use crate::scan::{agent_replies_after, parse_timestamp};
use crate::transport::AgentTransport;
use crate::types::{CreateResponseRequest, NormalizedMessage, PendingResponse, ResponseStatus};

/// Per-request polling parameters.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub flavor: ApiFlavor,
    pub extraction: ContentExtraction,
    pub max_attempts: u32,
    pub poll_delay: Duration,
    /// Total submissions allowed while the upstream answers 409 (at least 1).
    pub submit_retries: u32,
    pub submit_retry_delay: Duration,
    pub background: bool,
    /// Message flavor only: unchanged rounds before the scan stops early.
    pub stable_threshold: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollOptions {
    fn from(cfg: &PollConfig) -> Self {
        Self {
            flavor: cfg.flavor,
            extraction: cfg.extraction,
            max_attempts: cfg.max_attempts,
            poll_delay: Duration::from_millis(cfg.poll_delay_ms),
            submit_retries: cfg.submit_retries.max(1),
            submit_retry_delay: Duration::from_millis(cfg.submit_retry_delay_ms),
            background: cfg.background,
            stable_threshold: cfg.stable_threshold,
        }
    }
}

impl PollOptions {
    fn budget_secs(&self) -> u64 {
        self.poll_delay.saturating_mul(self.max_attempts).as_secs()
    }
}

/// Where a single request currently stands.
#[derive(Debug)]
enum PollState {
    Submitting,
    Polling { response: PendingResponse, attempt: u32 },
    Completed(PendingResponse),
    Failed(PendingResponse),
    TimedOut { response_id: String, attempts: u32 },
    SubmitRejectedBusy { attempts: u32, message: String },
}

impl PollState {
    /// Classify a freshly observed response.
    fn observe(response: PendingResponse, attempt: u32) -> Self {
        match response.status {
            ResponseStatus::Completed => Self::Completed(response),
            ResponseStatus::Failed => Self::Failed(response),
            _ => Self::Polling { response, attempt },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::Polling { .. } => "polling",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::SubmitRejectedBusy { .. } => "submit_rejected_busy",
        }
    }
}

/// Drives submit/poll cycles against an [`AgentTransport`].
#[derive(Clone)]
pub struct ResponsePoller {
    transport: Arc<dyn AgentTransport>,
}

impl ResponsePoller {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn AgentTransport> {
        &self.transport
    }

    /// Send `message` to `agent` and wait for the single final reply.
    pub async fn submit_and_await(
        &self,
        agent: &str,
        message: &str,
        options: &PollOptions,
    ) -> Result<NormalizedMessage, AgentError> {
        if agent.trim().is_empty() {
            return Err(AgentError::InvalidRequest("agentName is required".into()));
        }
        if message.trim().is_empty() {
            return Err(AgentError::InvalidRequest("content must not be empty".into()));
        }

        match options.flavor {
            ApiFlavor::Responses => self.await_response(agent, message, options).await,
            ApiFlavor::Messages => self.await_message_scan(agent, message, options).await,
        }
    }

    async fn await_response(
        &self,
        agent: &str,
        message: &str,
        options: &PollOptions,
    ) -> Result<NormalizedMessage, AgentError> {
        let request = CreateResponseRequest::text(message, options.background);
        let mut state = PollState::Submitting;

        loop {
            debug!(agent, state = state.label(), "poller state");
            state = match state {
                PollState::Submitting => {
                    let submitted = self
                        .submit_with_retry(agent, options, || {
                            self.transport.create_response(agent, &request)
                        })
                        .await;
                    match submitted {
                        Ok(submitted) => {
                            info!(
                                agent,
                                response_id = %submitted.id,
                                status = %submitted.status,
                                "response submitted"
                            );
                            PollState::observe(submitted, 0)
                        }
                        Err(AgentError::UpstreamBusy { attempts, message }) => {
                            PollState::SubmitRejectedBusy { attempts, message }
                        }
                        Err(e) => return Err(e),
                    }
                }

                PollState::Polling { response, attempt } if attempt >= options.max_attempts => {
                    PollState::TimedOut {
                        response_id: response.id,
                        attempts: attempt,
                    }
                }

                PollState::Polling { response, attempt } => {
                    tokio::time::sleep(options.poll_delay).await;
                    let attempt = attempt + 1;
                    match self.transport.get_response(agent, &response.id).await {
                        Ok(updated) => {
                            if updated.status != response.status {
                                debug!(
                                    agent,
                                    response_id = %response.id,
                                    attempt,
                                    from = %response.status,
                                    to = %updated.status,
                                    "response status changed"
                                );
                            }
                            PollState::observe(updated, attempt)
                        }
                        Err(e) => {
                            debug!(
                                agent,
                                response_id = %response.id,
                                attempt,
                                error = %e,
                                "poll failed, keeping last known state"
                            );
                            PollState::Polling { response, attempt }
                        }
                    }
                }

                PollState::Completed(response) => {
                    info!(agent, response_id = %response.id, "response completed");
                    return Ok(normalize_response(&response, options.extraction));
                }

                PollState::Failed(response) => {
                    warn!(agent, response_id = %response.id, "agent failed to process the request");
                    return Err(AgentError::ProcessingFailed {
                        response_id: response.id,
                    });
                }

                PollState::SubmitRejectedBusy { attempts, message } => {
                    return Err(AgentError::UpstreamBusy { attempts, message });
                }

                PollState::TimedOut {
                    response_id,
                    attempts,
                } => {
                    warn!(agent, response_id = %response_id, attempts, "response did not complete in time");
                    return Err(AgentError::Timeout {
                        response_id,
                        attempts,
                        budget_secs: options.budget_secs(),
                    });
                }
            };
        }
    }

    /// Legacy flow: post a message, then scan the message list until the
    /// agent's replies stop changing.
    async fn await_message_scan(
        &self,
        agent: &str,
        message: &str,
        options: &PollOptions,
    ) -> Result<NormalizedMessage, AgentError> {
        let user_message = self
            .submit_with_retry(agent, options, || self.transport.post_message(agent, message))
            .await?;
        let after = parse_timestamp(&user_message.created_at).ok_or_else(|| {
            AgentError::Decode(format!(
                "user message has no usable created_at: {:?}",
                user_message.created_at
            ))
        })?;
        info!(agent, message_id = %user_message.id, "message submitted");

        let mut replies = Vec::new();
        let mut last_count = 0usize;
        let mut stable_rounds = 0u32;
        let mut attempts = 0u32;

        while attempts < options.max_attempts {
            tokio::time::sleep(options.poll_delay).await;
            attempts += 1;

            let messages = match self.transport.list_messages(agent, None).await {
                Ok(m) => m,
                Err(e) => {
                    debug!(agent, attempt = attempts, error = %e, "message scan failed, retrying");
                    continue;
                }
            };

            replies = agent_replies_after(messages, &after);
            if replies.is_empty() {
                continue;
            }
            if replies.len() == last_count {
                stable_rounds += 1;
                if stable_rounds >= options.stable_threshold {
                    debug!(agent, replies = replies.len(), attempt = attempts, "agent replies settled");
                    break;
                }
            } else {
                stable_rounds = 0;
                last_count = replies.len();
            }
        }

        match replies.last() {
            Some(last) => {
                info!(agent, replies = replies.len(), "agent replied");
                Ok(normalize_agent_message(last, agent))
            }
            None => {
                warn!(agent, attempts, "agent did not reply in time");
                Err(AgentError::Timeout {
                    response_id: user_message.id.to_string(),
                    attempts,
                    budget_secs: options.budget_secs(),
                })
            }
        }
    }

    /// Run `submit` until it returns something other than a 409, at most
    /// `options.submit_retries` times, sleeping a fixed delay in between.
    async fn submit_with_retry<T, F, Fut>(
        &self,
        agent: &str,
        options: &PollOptions,
        mut submit: F,
    ) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = options.submit_retries.max(1);
        let mut attempt = 1;
        loop {
            match submit().await {
                Err(e) if e.is_busy() => {
                    let message = e.upstream_message().unwrap_or("agent is busy").to_string();
                    if attempt >= max_attempts {
                        warn!(agent, attempts = attempt, message = %message, "agent still busy, giving up");
                        return Err(AgentError::UpstreamBusy {
                            attempts: attempt,
                            message,
                        });
                    }
                    warn!(agent, attempt, max_attempts, message = %message, "agent busy, retrying submission");
                    tokio::time::sleep(options.submit_retry_delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use crate::types::{AgentMessage, ContentItem, MessageId};

    fn pending(id: &str, status: ResponseStatus) -> PendingResponse {
        PendingResponse {
            id: id.to_string(),
            status,
            created_at: Some("2025-03-01T10:00:00Z".to_string()),
            ..Default::default()
        }
    }

    fn completed(id: &str, text: &str) -> PendingResponse {
        PendingResponse {
            output_content: vec![ContentItem::text(text)],
            ..pending(id, ResponseStatus::Completed)
        }
    }

    fn busy() -> AgentError {
        AgentError::Upstream {
            status: 409,
            message: "agent is busy".into(),
        }
    }

    fn options(max_attempts: u32) -> PollOptions {
        PollOptions {
            max_attempts,
            ..PollOptions::default()
        }
    }

    fn setup() -> (ResponsePoller, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let poller = ResponsePoller::new(transport.clone() as Arc<dyn AgentTransport>);
        (poller, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn completed_on_submit_skips_polling() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(completed("abc", "done")));

        let msg = poller.submit_and_await("lway", "hi", &options(5)).await.unwrap();

        assert_eq!(msg.content, "done");
        assert_eq!(transport.submit_calls(), 1);
        assert_eq!(transport.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_then_in_progress_then_completed() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        transport.queue_poll(Ok(pending("abc", ResponseStatus::InProgress)));
        transport.queue_poll(Ok(pending("abc", ResponseStatus::InProgress)));
        transport.queue_poll(Ok(completed("abc", "Hello")));

        let msg = poller.submit_and_await("lway", "hi", &options(30)).await.unwrap();

        assert_eq!(msg.content, "Hello");
        assert_eq!(transport.submit_calls(), 1);
        assert_eq!(transport.poll_calls(), 3);
        assert_eq!(transport.polled_ids(), vec!["abc", "abc", "abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_delay_is_respected() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        transport.queue_poll(Ok(pending("abc", ResponseStatus::InProgress)));
        transport.queue_poll(Ok(completed("abc", "ok")));

        let start = tokio::time::Instant::now();
        poller.submit_and_await("lway", "hi", &options(30)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(4000));
        assert!(start.elapsed() < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stops_polling_immediately() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        transport.queue_poll(Ok(pending("abc", ResponseStatus::Failed)));
        transport.queue_poll(Ok(completed("abc", "never seen")));

        let err = poller.submit_and_await("lway", "hi", &options(30)).await.unwrap_err();

        assert!(matches!(err, AgentError::ProcessingFailed { ref response_id } if response_id == "abc"));
        assert_eq!(transport.poll_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_on_submit_is_processing_failed() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Failed)));

        let err = poller.submit_and_await("lway", "hi", &options(30)).await.unwrap_err();

        assert!(matches!(err, AgentError::ProcessingFailed { .. }));
        assert_eq!(transport.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_times_out_after_budget() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        // Unscripted polls fall back to the last queued reply.
        transport.queue_poll(Ok(pending("abc", ResponseStatus::InProgress)));

        let err = poller.submit_and_await("lway", "hi", &options(4)).await.unwrap_err();

        match err {
            AgentError::Timeout {
                response_id,
                attempts,
                budget_secs,
            } => {
                assert_eq!(response_id, "abc");
                assert_eq!(attempts, 4);
                assert_eq!(budget_secs, 8);
            }
            other => panic!("expected Timeout, got: {other:?}"),
        }
        assert_eq!(transport.poll_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_are_swallowed() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        transport.queue_poll(Err(AgentError::Upstream {
            status: 502,
            message: "bad gateway".into(),
        }));
        transport.queue_poll(Err(AgentError::Decode("truncated body".into())));
        transport.queue_poll(Ok(completed("abc", "recovered")));

        let msg = poller.submit_and_await("lway", "hi", &options(10)).await.unwrap();

        assert_eq!(msg.content, "recovered");
        assert_eq!(transport.poll_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_still_consume_attempts() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(pending("abc", ResponseStatus::Queued)));
        transport.queue_poll(Err(AgentError::Decode("nope".into())));

        let err = poller.submit_and_await("lway", "hi", &options(3)).await.unwrap_err();

        assert!(matches!(err, AgentError::Timeout { attempts: 3, .. }));
        assert_eq!(transport.poll_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_submit_is_retried_then_succeeds() {
        let (poller, transport) = setup();
        transport.queue_submit(Err(busy()));
        transport.queue_submit(Err(busy()));
        transport.queue_submit(Ok(completed("abc", "finally")));

        let start = tokio::time::Instant::now();
        let msg = poller.submit_and_await("lway", "hi", &options(5)).await.unwrap();

        assert_eq!(msg.content, "finally");
        assert_eq!(transport.submit_calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(4000));
        assert!(start.elapsed() < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_submit_gives_up_at_bound() {
        let (poller, transport) = setup();
        for _ in 0..9 {
            transport.queue_submit(Err(busy()));
        }
        transport.queue_submit(Err(AgentError::Upstream {
            status: 409,
            message: "still busy (10)".into(),
        }));
        transport.queue_submit(Ok(completed("abc", "too late")));

        let err = poller.submit_and_await("lway", "hi", &options(5)).await.unwrap_err();

        match err {
            AgentError::UpstreamBusy { attempts, message } => {
                assert_eq!(attempts, 10);
                assert_eq!(message, "still busy (10)");
            }
            other => panic!("expected UpstreamBusy, got: {other:?}"),
        }
        assert_eq!(transport.submit_calls(), 10);
        assert_eq!(transport.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn other_submit_errors_are_not_retried() {
        let (poller, transport) = setup();
        transport.queue_submit(Err(AgentError::Upstream {
            status: 401,
            message: "bad token".into(),
        }));

        let err = poller.submit_and_await("lway", "hi", &options(5)).await.unwrap_err();

        assert!(matches!(err, AgentError::Upstream { status: 401, .. }));
        assert_eq!(transport.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_carries_background_flag() {
        let (poller, transport) = setup();
        transport.queue_submit(Ok(completed("abc", "ok")));

        let opts = PollOptions {
            background: false,
            ..options(5)
        };
        poller.submit_and_await("lway", "what changed?", &opts).await.unwrap();

        let sent = transport.submitted_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "lway");
        assert_eq!(sent[0].1["background"], false);
        assert_eq!(sent[0].1["input"]["content"][0]["content"], "what changed?");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_message_is_rejected_without_network() {
        let (poller, transport) = setup();

        let err = poller.submit_and_await("lway", "   ", &options(5)).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        let err = poller.submit_and_await("", "hi", &options(5)).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        assert_eq!(transport.submit_calls(), 0);
    }

    // ── Message-scan flavor ───────────────────────────────────────

    fn message(id: u64, role: &str, content: &str, created_at: &str) -> AgentMessage {
        AgentMessage {
            id: MessageId::Number(id),
            role: role.to_string(),
            content: Some(content.to_string()),
            metadata: serde_json::Value::Null,
            created_at: created_at.to_string(),
        }
    }

    fn scan_options(max_attempts: u32, stable_threshold: u32) -> PollOptions {
        PollOptions {
            flavor: ApiFlavor::Messages,
            max_attempts,
            stable_threshold,
            ..PollOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn message_scan_returns_latest_reply_once_settled() {
        let (poller, transport) = setup();
        transport.queue_post_message(Ok(message(1, "user", "hi", "2025-03-01T10:00:00Z")));
        let early = vec![
            message(0, "agent", "stale", "2025-03-01T09:59:00Z"),
            message(1, "user", "hi", "2025-03-01T10:00:00Z"),
            message(2, "agent", "thinking", "2025-03-01T10:00:02Z"),
        ];
        let mut settled = early.clone();
        settled.push(message(3, "agent", "final answer", "2025-03-01T10:00:04Z"));
        transport.queue_list_messages(Ok(early));
        transport.queue_list_messages(Ok(settled));

        let msg = poller.submit_and_await("lway", "hi", &scan_options(60, 2)).await.unwrap();

        assert_eq!(msg.content, "final answer");
        assert_eq!(msg.id, MessageId::Number(3));
        // 1 round with one reply, 1 round with two, then 2 unchanged rounds.
        assert_eq!(transport.list_message_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn message_scan_times_out_without_replies() {
        let (poller, transport) = setup();
        transport.queue_post_message(Ok(message(1, "user", "hi", "2025-03-01T10:00:00Z")));
        transport.queue_list_messages(Ok(vec![message(1, "user", "hi", "2025-03-01T10:00:00Z")]));

        let err = poller.submit_and_await("lway", "hi", &scan_options(5, 10)).await.unwrap_err();

        assert!(matches!(err, AgentError::Timeout { attempts: 5, .. }));
        assert_eq!(transport.list_message_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn message_scan_returns_reply_when_budget_ends_before_settling() {
        let (poller, transport) = setup();
        transport.queue_post_message(Ok(message(1, "user", "hi", "2025-03-01T10:00:00Z")));
        transport.queue_list_messages(Ok(vec![message(2, "agent", "partial", "2025-03-01T10:00:01Z")]));

        let msg = poller.submit_and_await("lway", "hi", &scan_options(3, 10)).await.unwrap();

        assert_eq!(msg.content, "partial");
        assert_eq!(transport.list_message_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn message_scan_accepts_timestamps_without_offset() {
        let (poller, transport) = setup();
        transport.queue_post_message(Ok(message(1, "user", "hi", "2025-03-01T10:00:00.123456")));
        transport.queue_list_messages(Ok(vec![
            message(1, "user", "hi", "2025-03-01T10:00:00.123456"),
            message(2, "agent", "hello back", "2025-03-01T10:00:05.000000"),
        ]));

        let msg = poller.submit_and_await("lway", "hi", &scan_options(10, 2)).await.unwrap();

        assert_eq!(msg.content, "hello back");
        assert_eq!(msg.id, MessageId::Number(2));
    }

    #[test]
    fn budget_saturates_instead_of_overflowing() {
        let opts = PollOptions {
            poll_delay: Duration::from_secs(u64::MAX / 2),
            max_attempts: 3,
            ..PollOptions::default()
        };
        assert_eq!(opts.budget_secs(), u64::MAX);
    }
}
