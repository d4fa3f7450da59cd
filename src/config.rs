//! Configuration management for the tRNA assistant.
//!
//! Configuration can be set via environment variables:
//! - `ANTHROPIC_API_KEY` - Required. Your Anthropic API key.
//! - `DEFAULT_MODEL` - Optional. The LLM model to use. Defaults to `claude-3-5-sonnet-20240620`.
//! - `ANTHROPIC_BASE_URL` - Optional. Messages API base URL. Defaults to `https://api.anthropic.com/v1`.
//! - `MAX_TOKENS` - Optional. Completion token cap. Defaults to `1000`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.7`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8080`, where the web frontend expects the API.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Timeout for every outbound call. Defaults to `60`.
//! - `MAX_HISTORY_TURNS` - Optional. Turns kept per conversation, `0` = unbounded. Defaults to `50`.
//! - `SESSION_IDLE_TTL_SECS` - Optional. Idle conversations are dropped after this, `0` = never. Defaults to `3600`.
//! - `RNACENTRAL_SEARCH_URL` - Optional. EBI Search endpoint for the RNAcentral domain.
//! - `RNACENTRAL_API_URL` - Optional. RNAcentral REST API base.
//! - `RNACENTRAL_PORTAL_URL` - Optional. RNAcentral website, used for deep links.
//! - `SEARCH_PAGE_SIZE` - Optional. Identifiers requested per search. Defaults to `100`.
//! - `DEV_MODE` - Optional. Permissive CORS. Defaults to `true` in debug builds.

use thiserror::Error;
use url::Url;

pub const DEFAULT_RNACENTRAL_SEARCH_URL: &str = "https://www.ebi.ac.uk/ebisearch/ws/rest/rnacentral";
pub const DEFAULT_RNACENTRAL_API_URL: &str = "https://rnacentral.org/api/v1";
pub const DEFAULT_RNACENTRAL_PORTAL_URL: &str = "https://rnacentral.org";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Language model settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Anthropic API key
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Messages API base URL (without the `/messages` suffix)
    pub base_url: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

/// RNAcentral lookup settings.
#[derive(Debug, Clone)]
pub struct RnaCentralConfig {
    /// EBI Search REST endpoint for the `rnacentral` domain
    pub search_url: String,

    /// RNAcentral REST API base
    pub api_url: String,

    /// RNAcentral portal, used for human-facing links
    pub portal_url: String,

    /// Number of identifiers requested from the search service
    pub page_size: usize,
}

impl Default for RnaCentralConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_RNACENTRAL_SEARCH_URL.to_string(),
            api_url: DEFAULT_RNACENTRAL_API_URL.to_string(),
            portal_url: DEFAULT_RNACENTRAL_PORTAL_URL.to_string(),
            page_size: 100,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Language model settings
    pub llm: LlmConfig,

    /// RNAcentral lookup settings
    pub rnacentral: RnaCentralConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Timeout applied to every outbound HTTP call, in seconds
    pub request_timeout_secs: u64,

    /// Conversation turns retained per session (0 = unbounded)
    pub max_history_turns: usize,

    /// Idle session lifetime in seconds (0 = sessions are never evicted)
    pub session_idle_ttl_secs: u64,

    /// Development mode (permissive CORS)
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `ANTHROPIC_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for any variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;

        let llm = LlmConfig {
            api_key,
            model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20240620".to_string()),
            base_url: parse_url_var("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1")?,
            max_tokens: parse_var("MAX_TOKENS", 1000)?,
            temperature: parse_var("TEMPERATURE", 0.7)?,
        };

        let rnacentral = RnaCentralConfig {
            search_url: parse_url_var("RNACENTRAL_SEARCH_URL", DEFAULT_RNACENTRAL_SEARCH_URL)?,
            api_url: parse_url_var("RNACENTRAL_API_URL", DEFAULT_RNACENTRAL_API_URL)?,
            portal_url: parse_url_var("RNACENTRAL_PORTAL_URL", DEFAULT_RNACENTRAL_PORTAL_URL)?,
            page_size: parse_var("SEARCH_PAGE_SIZE", 100)?,
        };
        if rnacentral.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "SEARCH_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", 8080)?;
        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 60)?;
        let max_history_turns = parse_var("MAX_HISTORY_TURNS", 50)?;
        let session_idle_ttl_secs = parse_var("SESSION_IDLE_TTL_SECS", 3600)?;

        let dev_mode = std::env::var("DEV_MODE")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("DEV_MODE".to_string(), e)))
            .transpose()?
            // In debug builds, default to dev_mode=true; in release, default to false.
            .unwrap_or(cfg!(debug_assertions));

        Ok(Self {
            llm,
            rnacentral,
            host,
            port,
            request_timeout_secs,
            max_history_turns,
            session_idle_ttl_secs,
            dev_mode,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String) -> Self {
        Self {
            llm: LlmConfig {
                api_key,
                model: "claude-3-5-sonnet-20240620".to_string(),
                base_url: "https://api.anthropic.com/v1".to_string(),
                max_tokens: 1000,
                temperature: 0.7,
            },
            rnacentral: RnaCentralConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 60,
            max_history_turns: 50,
            session_idle_ttl_secs: 3600,
            dev_mode: true,
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn parse_url_var(name: &str, default: &str) -> Result<String, ConfigError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    validate_url(&raw).map_err(|e| ConfigError::InvalidValue(name.to_string(), e))
}

/// Validate an http(s) base URL and strip any trailing slash.
fn validate_url(raw: &str) -> Result<String, String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| format!("{}", e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim().trim_end_matches('/').to_string()),
        other => Err(format!("unsupported URL scheme: {}", other)),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
