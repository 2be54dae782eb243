use serde::Deserialize;
use std::env;

use crate::error::{BarneyError, Result};
use crate::llm::prompts::{DEFAULT_FALLBACK_RESPONSE, DEFAULT_SYSTEM_PROMPT};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Reads a required variable. Blank values count as missing.
fn required(var: &str) -> Result<String> {
    required_any(&[var])
}

/// Reads the first of `vars` that is set. The first name is the canonical one
/// reported when none are present.
fn required_any(vars: &[&str]) -> Result<String> {
    vars.iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| BarneyError::ConfigurationMissing(vars[0].to_string()))
}

fn required_url(var: &str) -> Result<String> {
    let raw = required(var)?;
    validate_url(var, &raw)?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn validate_url(var: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| BarneyError::InvalidConfiguration {
        var: var.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BarneyError::InvalidConfiguration {
            var: var.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub embeddings: EmbeddingsConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole `/ask` round trip.
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

/// Azure AI Search index holding the embedded wine reviews.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
    pub api_version: String,
    pub top_k: usize,
    pub content_field: String,
    pub vector_field: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// OpenAI-compatible embedding endpoint used to vectorize queries. Must be the
/// same model the index was populated with.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Azure OpenAI chat deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub system_prompt: String,
    pub fallback_response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Maximum turns kept per session; oldest are evicted first.
    pub max_turns: usize,
    pub ttl_secs: u64,
    pub capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 60,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            ttl_secs: 1800,
            capacity: 10_000,
            sweep_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("BARNEY_HOST").unwrap_or(defaults.host),
            port: parse_env_or("BARNEY_PORT", defaults.port),
            request_timeout_secs: parse_env_or(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            max_body_bytes: parse_env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
        }
    }
}

impl SearchConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: required_url("SEARCH_SERVICE_NAME")?,
            api_key: required("SEARCH_API_KEY")?,
            index_name: required("SEARCH_INDEX_NAME")?,
            api_version: env::var("SEARCH_API_VERSION")
                .unwrap_or_else(|_| "2023-11-01".to_string()),
            top_k: parse_env_or("SEARCH_TOP_K", 5),
            content_field: env::var("SEARCH_CONTENT_FIELD")
                .unwrap_or_else(|_| "content".to_string()),
            vector_field: env::var("SEARCH_VECTOR_FIELD")
                .unwrap_or_else(|_| "content_vector".to_string()),
            timeout_secs: parse_env_or("SEARCH_TIMEOUT_SECS", 30),
            max_retries: parse_env_or("SEARCH_MAX_RETRIES", 1),
        })
    }
}

impl EmbeddingsConfig {
    fn from_env() -> Result<Self> {
        let base_url = env::var("EMBEDDING_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        validate_url("EMBEDDING_BASE_URL", &base_url)?;

        Ok(Self {
            model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: required("OPENAI_API_KEY")?,
            dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 1536),
            timeout_secs: parse_env_or("EMBEDDING_TIMEOUT_SECS", 30),
            max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 1),
        })
    }
}

impl ChatConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: required_url("AZURE_OPENAI_ENDPOINT")?,
            api_key: required("AZURE_OPENAI_KEY")?,
            api_version: required("AZURE_OPENAI_API_VERSION_CHAT")?,
            // Older deployments shipped with the misspelled variable name.
            deployment: required_any(&[
                "AZURE_OPENAI_CHAT_DEPLOYMENT",
                "AZURE_OPENAI_CHAT_DEPLOYEMENT",
            ])?,
            timeout_secs: parse_env_or("CHAT_TIMEOUT_SECS", 60),
            max_retries: parse_env_or("CHAT_MAX_RETRIES", 0),
            system_prompt: env::var("CHAT_SYSTEM_PROMPT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            fallback_response: env::var("CHAT_FALLBACK_RESPONSE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FALLBACK_RESPONSE.to_string()),
        })
    }
}

impl SessionConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_turns: parse_env_or("SESSION_MAX_TURNS", defaults.max_turns),
            ttl_secs: parse_env_or("SESSION_TTL_SECS", defaults.ttl_secs),
            capacity: parse_env_or("SESSION_CAPACITY", defaults.capacity),
            sweep_interval_secs: parse_env_or(
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
        }
    }
}

impl Config {
    /// Builds the configuration from the process environment. Any missing
    /// required variable is reported here so the process can refuse to start.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env(),
            search: SearchConfig::from_env()?,
            embeddings: EmbeddingsConfig::from_env()?,
            chat: ChatConfig::from_env()?,
            session: SessionConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 10] = [
            ("SEARCH_TOP_K", self.search.top_k > 0),
            ("EMBEDDING_DIMENSIONS", self.embeddings.dimensions > 0),
            ("SESSION_MAX_TURNS", self.session.max_turns > 0),
            ("SESSION_CAPACITY", self.session.capacity > 0),
            ("REQUEST_TIMEOUT_SECS", self.server.request_timeout_secs > 0),
            ("SEARCH_TIMEOUT_SECS", self.search.timeout_secs > 0),
            ("EMBEDDING_TIMEOUT_SECS", self.embeddings.timeout_secs > 0),
            ("CHAT_TIMEOUT_SECS", self.chat.timeout_secs > 0),
            ("SESSION_TTL_SECS", self.session.ttl_secs > 0),
            ("SESSION_SWEEP_INTERVAL_SECS", self.session.sweep_interval_secs > 0),
        ];

        for (var, ok) in checks {
            if !ok {
                return Err(BarneyError::InvalidConfiguration {
                    var: var.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}
