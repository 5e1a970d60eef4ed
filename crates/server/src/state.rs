use std::sync::Arc;

use relay_agent::{AgentError, AgentTransport, HttpAgentClient, PollOptions, ResponsePoller};
use relay_core::{Config, ConfigError};

pub struct AppState {
    pub config: Config,
    pub poll: PollOptions,
    /// `None` when the bearer token is missing; agent routes then answer 500
    /// without touching the network.
    pub transport: Option<Arc<dyn AgentTransport>>,
}

impl AppState {
    /// Build state from config. A missing token or bad base URL leaves the
    /// agent routes disabled instead of failing startup.
    pub fn from_config(config: Config) -> Self {
        let transport = match HttpAgentClient::from_config(&config.agent) {
            Ok(client) => {
                tracing::info!(base_url = %config.agent.base_url, "agent service client ready");
                Some(Arc::new(client) as Arc<dyn AgentTransport>)
            }
            Err(e) => {
                tracing::warn!(error = %e, "agent service not available, agent routes will answer 500");
                None
            }
        };
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: Config, transport: Option<Arc<dyn AgentTransport>>) -> Self {
        let poll = PollOptions::from(&config.poll);
        Self {
            config,
            poll,
            transport,
        }
    }

    pub fn transport(&self) -> Result<&dyn AgentTransport, AgentError> {
        match &self.transport {
            Some(t) => Ok(t.as_ref()),
            None => Err(self.missing_transport()),
        }
    }

    pub fn poller(&self) -> Result<ResponsePoller, AgentError> {
        match &self.transport {
            Some(t) => Ok(ResponsePoller::new(t.clone())),
            None => Err(self.missing_transport()),
        }
    }

    fn missing_transport(&self) -> AgentError {
        match self.config.agent.require_token() {
            Err(e) => e.into(),
            Ok(_) => ConfigError::Invalid {
                key: "AGENT_API_BASE_URL",
                value: self.config.agent.base_url.clone(),
            }
            .into(),
        }
    }

    /// Agent for routes that fall back to `AGENT_NAME`.
    pub fn resolve_agent(&self, requested: Option<&str>) -> Result<String, AgentError> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.config.agent.require_default_agent()?.to_string()),
        }
    }
}
