use relay_core::ConfigError;

/// Everything that can end a relay operation without a result.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream kept answering 409 until the submit budget ran out.
    #[error("agent is busy after {attempts} submit attempts: {message}")]
    UpstreamBusy { attempts: u32, message: String },

    /// Non-2xx reply from the upstream.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("response {response_id} failed upstream")]
    ProcessingFailed { response_id: String },

    #[error("response {response_id} not complete after {attempts} polls ({budget_secs}s)")]
    Timeout {
        response_id: String,
        attempts: u32,
        budget_secs: u64,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),
}

impl AgentError {
    /// True for the upstream's admission-control signal.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Upstream { status: 409, .. })
    }

    /// Upstream message text, when the error came from an upstream reply.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Upstream { message, .. } | Self::UpstreamBusy { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_409_counts_as_busy() {
        let busy = AgentError::Upstream {
            status: 409,
            message: "agent busy".into(),
        };
        assert!(busy.is_busy());
        let other = AgentError::Upstream {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(!other.is_busy());
        assert!(!AgentError::Decode("bad".into()).is_busy());
    }

    #[test]
    fn config_errors_pass_through_display() {
        let err: AgentError = ConfigError::Missing("AGENT_BEARER_TOKEN").into();
        assert_eq!(err.to_string(), "AGENT_BEARER_TOKEN environment variable is required");
    }
}
