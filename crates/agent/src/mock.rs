//! Scripted [`AgentTransport`] for exercising the poller and the HTTP layer
//! without a live agent service.
//!
//! Each upstream call pops the next queued reply. The last reply of a queue
//! is sticky: once a single entry remains it is replayed on every further
//! call, so "stays in_progress forever" needs only one entry.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::transport::AgentTransport;
use crate::types::{
    AgentList, AgentMessage, CreateResponseRequest, Page, PendingResponse, RemixRequest,
};

type Script<T> = Mutex<VecDeque<Result<T, AgentError>>>;

/// Rebuild an error for replay; transport errors degrade to `Decode`.
fn replay_error(e: &AgentError) -> AgentError {
    match e {
        AgentError::Config(c) => AgentError::Config(c.clone()),
        AgentError::InvalidRequest(m) => AgentError::InvalidRequest(m.clone()),
        AgentError::UpstreamBusy { attempts, message } => AgentError::UpstreamBusy {
            attempts: *attempts,
            message: message.clone(),
        },
        AgentError::Upstream { status, message } => AgentError::Upstream {
            status: *status,
            message: message.clone(),
        },
        AgentError::ProcessingFailed { response_id } => AgentError::ProcessingFailed {
            response_id: response_id.clone(),
        },
        AgentError::Timeout {
            response_id,
            attempts,
            budget_secs,
        } => AgentError::Timeout {
            response_id: response_id.clone(),
            attempts: *attempts,
            budget_secs: *budget_secs,
        },
        AgentError::Http(e) => AgentError::Decode(e.to_string()),
        AgentError::Decode(m) => AgentError::Decode(m.clone()),
    }
}

fn next<T: Clone>(script: &Script<T>, call: &str) -> Result<T, AgentError> {
    let mut queue = script.lock().unwrap();
    if queue.len() > 1 {
        return queue.pop_front().unwrap();
    }
    match queue.front() {
        Some(Ok(v)) => Ok(v.clone()),
        Some(Err(e)) => Err(replay_error(e)),
        None => Err(AgentError::Decode(format!("no scripted reply for {call}"))),
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    submits: Script<PendingResponse>,
    polls: Script<PendingResponse>,
    response_lists: Script<Vec<PendingResponse>>,
    posted: Script<AgentMessage>,
    message_lists: Script<Vec<AgentMessage>>,
    remixes: Script<serde_json::Value>,
    wakes: Script<serde_json::Value>,
    agents: Script<serde_json::Value>,
    agent_lists: Script<AgentList>,
    files: Script<String>,

    submitted: Mutex<Vec<(String, serde_json::Value)>>,
    polled: Mutex<Vec<String>>,
    posted_messages: Mutex<Vec<(String, String)>>,
    message_list_calls: Mutex<usize>,
    response_list_calls: Mutex<Vec<(String, Page)>>,
    agent_lookups: Mutex<Vec<String>>,
    remix_requests: Mutex<Vec<(String, String)>>,
    woken: Mutex<Vec<(String, Option<String>)>>,
    agent_queries: Mutex<Vec<(String, u32)>>,
    file_reads: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_submit(&self, reply: Result<PendingResponse, AgentError>) {
        self.submits.lock().unwrap().push_back(reply);
    }

    pub fn queue_poll(&self, reply: Result<PendingResponse, AgentError>) {
        self.polls.lock().unwrap().push_back(reply);
    }

    pub fn queue_list_responses(&self, reply: Result<Vec<PendingResponse>, AgentError>) {
        self.response_lists.lock().unwrap().push_back(reply);
    }

    pub fn queue_post_message(&self, reply: Result<AgentMessage, AgentError>) {
        self.posted.lock().unwrap().push_back(reply);
    }

    pub fn queue_list_messages(&self, reply: Result<Vec<AgentMessage>, AgentError>) {
        self.message_lists.lock().unwrap().push_back(reply);
    }

    pub fn queue_remix(&self, reply: Result<serde_json::Value, AgentError>) {
        self.remixes.lock().unwrap().push_back(reply);
    }

    pub fn queue_wake(&self, reply: Result<serde_json::Value, AgentError>) {
        self.wakes.lock().unwrap().push_back(reply);
    }

    pub fn queue_get_agent(&self, reply: Result<serde_json::Value, AgentError>) {
        self.agents.lock().unwrap().push_back(reply);
    }

    pub fn queue_list_agents(&self, reply: Result<AgentList, AgentError>) {
        self.agent_lists.lock().unwrap().push_back(reply);
    }

    pub fn queue_file(&self, reply: Result<String, AgentError>) {
        self.files.lock().unwrap().push_back(reply);
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// `(agent, request body)` for every submission, in order.
    pub fn submitted_requests(&self) -> Vec<(String, serde_json::Value)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_calls(&self) -> usize {
        self.polled.lock().unwrap().len()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }

    pub fn posted_messages(&self) -> Vec<(String, String)> {
        self.posted_messages.lock().unwrap().clone()
    }

    pub fn list_message_calls(&self) -> usize {
        *self.message_list_calls.lock().unwrap()
    }

    /// `(agent, page)` for every response-list call.
    pub fn response_list_calls(&self) -> Vec<(String, Page)> {
        self.response_list_calls.lock().unwrap().clone()
    }

    pub fn agent_lookups(&self) -> Vec<String> {
        self.agent_lookups.lock().unwrap().clone()
    }

    /// `(parent, requested name)` for every remix call.
    pub fn remix_requests(&self) -> Vec<(String, String)> {
        self.remix_requests.lock().unwrap().clone()
    }

    pub fn woken(&self) -> Vec<(String, Option<String>)> {
        self.woken.lock().unwrap().clone()
    }

    pub fn agent_queries(&self) -> Vec<(String, u32)> {
        self.agent_queries.lock().unwrap().clone()
    }

    pub fn file_reads(&self) -> Vec<(String, String)> {
        self.file_reads.lock().unwrap().clone()
    }

    /// Total upstream calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.submit_calls()
            + self.poll_calls()
            + self.posted_messages().len()
            + self.list_message_calls()
            + self.response_list_calls().len()
            + self.agent_lookups().len()
            + self.remix_requests().len()
            + self.woken().len()
            + self.agent_queries().len()
            + self.file_reads().len()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn create_response(
        &self,
        agent: &str,
        request: &CreateResponseRequest,
    ) -> Result<PendingResponse, AgentError> {
        let body = serde_json::to_value(request).unwrap_or_default();
        self.submitted.lock().unwrap().push((agent.to_string(), body));
        next(&self.submits, "create_response")
    }

    async fn get_response(&self, _agent: &str, id: &str) -> Result<PendingResponse, AgentError> {
        self.polled.lock().unwrap().push(id.to_string());
        next(&self.polls, "get_response")
    }

    async fn list_responses(
        &self,
        agent: &str,
        page: Page,
    ) -> Result<Vec<PendingResponse>, AgentError> {
        self.response_list_calls
            .lock()
            .unwrap()
            .push((agent.to_string(), page));
        next(&self.response_lists, "list_responses")
    }

    async fn post_message(&self, agent: &str, content: &str) -> Result<AgentMessage, AgentError> {
        self.posted_messages
            .lock()
            .unwrap()
            .push((agent.to_string(), content.to_string()));
        next(&self.posted, "post_message")
    }

    async fn list_messages(
        &self,
        _agent: &str,
        _page: Option<Page>,
    ) -> Result<Vec<AgentMessage>, AgentError> {
        *self.message_list_calls.lock().unwrap() += 1;
        next(&self.message_lists, "list_messages")
    }

    async fn remix(
        &self,
        parent: &str,
        request: &RemixRequest,
    ) -> Result<serde_json::Value, AgentError> {
        self.remix_requests
            .lock()
            .unwrap()
            .push((parent.to_string(), request.name.clone()));
        next(&self.remixes, "remix")
    }

    async fn wake(&self, agent: &str, prompt: Option<&str>) -> Result<serde_json::Value, AgentError> {
        self.woken
            .lock()
            .unwrap()
            .push((agent.to_string(), prompt.map(str::to_string)));
        next(&self.wakes, "wake")
    }

    async fn get_agent(&self, agent: &str) -> Result<serde_json::Value, AgentError> {
        self.agent_lookups.lock().unwrap().push(agent.to_string());
        next(&self.agents, "get_agent")
    }

    async fn list_agents(&self, query: &str, limit: u32) -> Result<AgentList, AgentError> {
        self.agent_queries
            .lock()
            .unwrap()
            .push((query.to_string(), limit));
        next(&self.agent_lists, "list_agents")
    }

    async fn read_file(&self, agent: &str, path: &str) -> Result<String, AgentError> {
        self.file_reads
            .lock()
            .unwrap()
            .push((agent.to_string(), path.to_string()));
        next(&self.files, "read_file")
    }
}
