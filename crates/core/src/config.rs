use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upstream base URL used when neither `AGENT_API_BASE_URL` nor the dashboard's
/// `NEXT_PUBLIC_AGENT_API_BASE_URL` is set.
pub const DEFAULT_AGENT_API_BASE_URL: &str = "https://remoteagent.raworc.com/api/v0";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

/// Parse an enum-valued key; unrecognised values log a warning and keep the default.
fn profiled_env_parse<T>(profile: &str, key: &str, default: T) -> T
where
    T: FromStr<Err = ConfigError>,
{
    match profiled_env_opt(profile, key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "ignoring invalid config value");
            default
        }),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub agent: AgentServiceConfig,
    pub poll: PollConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RELAY_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RELAY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            agent: AgentServiceConfig::from_env_profiled(p),
            poll: PollConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:  {}:{} (cors: {})", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!(
            "  agent:   base_url={}, default_agent={}, token={}",
            self.agent.base_url,
            self.agent.default_agent.as_deref().unwrap_or("(none)"),
            if self.agent.bearer_token.is_some() { "set" } else { "MISSING" },
        );
        tracing::info!(
            "  poll:    flavor={}, extraction={}, max_attempts={}, delay={}ms, submit_retries={}",
            self.poll.flavor,
            self.poll.extraction,
            self.poll.max_attempts,
            self.poll.poll_delay_ms,
            self.poll.submit_retries,
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3001),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Agent service ─────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct AgentServiceConfig {
    pub base_url: String,
    /// Agent used by routes that do not name one explicitly.
    pub default_agent: Option<String>,
    #[serde(skip_serializing)]
    pub bearer_token: Option<String>,
    /// Per-call HTTP timeout for upstream requests.
    pub request_timeout_secs: u64,
    /// Workspace file served by the files route when no path is given.
    pub default_file_path: String,
}

// Bearer token is redacted.
impl fmt::Debug for AgentServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentServiceConfig")
            .field("base_url", &self.base_url)
            .field("default_agent", &self.default_agent)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_file_path", &self.default_file_path)
            .finish()
    }
}

impl AgentServiceConfig {
    fn from_env_profiled(p: &str) -> Self {
        let base_url = profiled_env_opt(p, "AGENT_API_BASE_URL")
            .or_else(|| profiled_env_opt(p, "NEXT_PUBLIC_AGENT_API_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_AGENT_API_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_agent: profiled_env_opt(p, "AGENT_NAME")
                .or_else(|| profiled_env_opt(p, "NEXT_PUBLIC_AGENT_NAME")),
            bearer_token: profiled_env_opt(p, "AGENT_BEARER_TOKEN"),
            request_timeout_secs: profiled_env_u64(p, "AGENT_REQUEST_TIMEOUT_SECS", 60),
            default_file_path: profiled_env_or(p, "AGENT_DEFAULT_FILE_PATH", "content/report.html"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// The bearer token, or `ConfigError::Missing` naming the env var.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.bearer_token
            .as_deref()
            .ok_or(ConfigError::Missing("AGENT_BEARER_TOKEN"))
    }

    /// The default agent name, or `ConfigError::Missing` naming the env var.
    pub fn require_default_agent(&self) -> Result<&str, ConfigError> {
        self.default_agent
            .as_deref()
            .ok_or(ConfigError::Missing("AGENT_NAME"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Polling ───────────────────────────────────────────────────

/// Which upstream API generation the relay talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// `POST /responses` then poll the created response by id.
    Responses,
    /// `POST /messages` then scan the message list until replies settle.
    Messages,
}

impl FromStr for ApiFlavor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "responses" => Ok(Self::Responses),
            "messages" => Ok(Self::Messages),
            other => Err(ConfigError::Invalid {
                key: "AGENT_API_FLAVOR",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responses => write!(f, "responses"),
            Self::Messages => write!(f, "messages"),
        }
    }
}

/// How display text is pulled out of a completed response's `output_content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentExtraction {
    /// Render every usable item, blank-line separated.
    Concatenate,
    /// First `markdown` item, else first `text` item, then any `url` items.
    PreferMarkdown,
}

impl FromStr for ContentExtraction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concatenate" => Ok(Self::Concatenate),
            "prefer-markdown" | "prefer_markdown" => Ok(Self::PreferMarkdown),
            other => Err(ConfigError::Invalid {
                key: "AGENT_CONTENT_EXTRACTION",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContentExtraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concatenate => write!(f, "concatenate"),
            Self::PreferMarkdown => write!(f, "prefer-markdown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub flavor: ApiFlavor,
    pub extraction: ContentExtraction,
    /// Upper bound on poll iterations after the submit call.
    pub max_attempts: u32,
    pub poll_delay_ms: u64,
    /// Total submissions allowed while the upstream answers 409.
    pub submit_retries: u32,
    pub submit_retry_delay_ms: u64,
    /// Ask the upstream to process the response in the background.
    pub background: bool,
    /// Unchanged scan rounds after which the message flavor stops early.
    pub stable_threshold: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            flavor: ApiFlavor::Responses,
            extraction: ContentExtraction::Concatenate,
            max_attempts: 1800,
            poll_delay_ms: 2000,
            submit_retries: 10,
            submit_retry_delay_ms: 2000,
            background: true,
            stable_threshold: 10,
        }
    }
}

impl PollConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            flavor: profiled_env_parse(p, "AGENT_API_FLAVOR", d.flavor),
            extraction: profiled_env_parse(p, "AGENT_CONTENT_EXTRACTION", d.extraction),
            max_attempts: profiled_env_u32(p, "AGENT_POLL_MAX_ATTEMPTS", d.max_attempts),
            poll_delay_ms: profiled_env_u64(p, "AGENT_POLL_DELAY_MS", d.poll_delay_ms),
            submit_retries: profiled_env_u32(p, "AGENT_SUBMIT_RETRIES", d.submit_retries).max(1),
            submit_retry_delay_ms: profiled_env_u64(p, "AGENT_SUBMIT_RETRY_DELAY_MS", d.submit_retry_delay_ms),
            background: profiled_env_bool(p, "AGENT_BACKGROUND", d.background),
            stable_threshold: profiled_env_u32(p, "AGENT_STABLE_THRESHOLD", d.stable_threshold),
        }
    }

    /// Wall-clock budget of the poll loop, ignoring request latency.
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms.saturating_mul(self.max_attempts as u64))
    }
}
