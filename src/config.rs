//! Configuration management for the payroll agent.
//!
//! Configuration is set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `OPENAI_API_KEY` - Completion backend key. Required by the agent endpoints.
//! - `LLM_BASE_URL` - Optional. Chat-completions base URL. Defaults to `https://api.openai.com/v1`.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `gpt-5`.
//! - `MAX_ITERATIONS` - Optional. Completion requests per session. Defaults to `10`.
//! - `LLM_MAX_RETRIES` - Optional. Transport-level retries of transient LLM errors. Defaults to `0`.
//! - `LOCUS_API_KEY` - Payment backend key. Required by the payment tool.
//! - `LOCUS_MCP_URL` - Optional. Defaults to `https://mcp.paywithlocus.com/mcp`.
//! - `TABLE_STORE` - Optional. `supabase` (default) or `memory`.
//! - `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`, `SUPABASE_ANON_KEY` - Table store
//!   credentials; the service-role key is preferred.
//! - `METORIAL_API_KEY`, `GITHUB_SERVER_DEPLOYMENT_ID` - OAuth broker credentials.
//! - `METORIAL_BASE_URL` - Optional. Defaults to `https://api.metorial.com`.
//! - `METORIAL_MCP_URL` - Optional. MCP gateway of server deployments, used to list
//!   pull requests. Defaults to `https://mcp.metorial.com`.
//! - `OAUTH_POLL_ATTEMPTS`, `OAUTH_POLL_DELAY_MS` - Optional. Defaults `5` and `400`.
//!
//! Credentials are optional at startup. Each endpoint checks the ones it
//! needs through the `require_*` accessors before doing any work.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::oauth::PollPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Duplicate tool name in registry: {0}")]
    DuplicateTool(String),
}

/// Which table store implementation backs the database tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    /// Non-persistent, for local runs
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'supabase' or 'memory', got '{}'", other)),
        }
    }
}

/// Table store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Supabase project URL
    pub supabase_url: Option<String>,

    /// Service role key (full access, preferred)
    pub supabase_service_role_key: Option<String>,

    /// Anonymous key (row-level security applies)
    pub supabase_anon_key: Option<String>,
}

impl StoreConfig {
    /// Project URL and the best available key.
    pub fn supabase_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .supabase_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SUPABASE_URL".to_string()))?;
        let key = self
            .supabase_service_role_key
            .as_deref()
            .or(self.supabase_anon_key.as_deref())
            .ok_or_else(|| {
                ConfigError::MissingEnvVar(
                    "SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY".to_string(),
                )
            })?;
        Ok((url, key))
    }
}

/// OAuth broker configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub metorial_api_key: Option<String>,
    pub metorial_base_url: String,
    pub metorial_mcp_url: String,
    pub github_server_deployment_id: Option<String>,
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
}

impl OAuthConfig {
    /// API key and server deployment id.
    pub fn require_metorial(&self) -> Result<(&str, &str), ConfigError> {
        let key = self
            .metorial_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("METORIAL_API_KEY".to_string()))?;
        let deployment = self
            .github_server_deployment_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GITHUB_SERVER_DEPLOYMENT_ID".to_string()))?;
        Ok((key, deployment))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.poll_attempts,
            delay: Duration::from_millis(self.poll_delay_ms),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub openai_api_key: Option<String>,

    /// Chat-completions base URL
    pub llm_base_url: String,

    /// Model identifier sent to the completion backend
    pub default_model: String,

    /// Completion requests per session before giving up
    pub max_iterations: usize,

    /// Transport-level retries of transient completion errors
    pub llm_max_retries: u32,

    pub locus_api_key: Option<String>,

    pub locus_mcp_url: String,

    pub store: StoreConfig,

    pub oauth: OAuthConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric or enumerated variable
    /// does not parse. Missing credentials are not an error here.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` (empty values count as unset).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let store = StoreConfig {
            backend: parsed(&var, "TABLE_STORE", StoreBackend::Supabase)?,
            supabase_url: var("SUPABASE_URL"),
            supabase_service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_anon_key: var("SUPABASE_ANON_KEY"),
        };

        let oauth = OAuthConfig {
            metorial_api_key: var("METORIAL_API_KEY"),
            metorial_base_url: or("METORIAL_BASE_URL", crate::oauth::DEFAULT_METORIAL_URL),
            metorial_mcp_url: or("METORIAL_MCP_URL", crate::github::DEFAULT_METORIAL_MCP_URL),
            github_server_deployment_id: var("GITHUB_SERVER_DEPLOYMENT_ID"),
            poll_attempts: parsed(&var, "OAUTH_POLL_ATTEMPTS", 5)?,
            poll_delay_ms: parsed(&var, "OAUTH_POLL_DELAY_MS", 400)?,
        };

        Ok(Self {
            host: or("HOST", "127.0.0.1"),
            port: parsed(&var, "PORT", 3000)?,
            openai_api_key: var("OPENAI_API_KEY"),
            llm_base_url: or("LLM_BASE_URL", crate::llm::DEFAULT_BASE_URL),
            default_model: or("DEFAULT_MODEL", "gpt-5"),
            max_iterations: parsed(&var, "MAX_ITERATIONS", crate::agents::DEFAULT_MAX_ITERATIONS)?,
            llm_max_retries: parsed(&var, "LLM_MAX_RETRIES", 0)?,
            locus_api_key: var("LOCUS_API_KEY"),
            locus_mcp_url: or("LOCUS_MCP_URL", "https://mcp.paywithlocus.com/mcp"),
            store,
            oauth,
        })
    }

    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    pub fn require_locus_key(&self) -> Result<&str, ConfigError> {
        self.locus_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("LOCUS_API_KEY".to_string()))
    }
}

fn parsed<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
