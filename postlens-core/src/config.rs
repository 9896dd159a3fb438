use crate::error::ConfigError;

pub const PROFILE_TOKEN_VAR: &str = "TWITTER_BEARER_TOKEN";
pub const LLM_KEY_VAR: &str = "OPENAI_API_KEY";

const DEFAULT_PROFILE_API_BASE: &str = "https://api.twitter.com";
const DEFAULT_LLM_API_BASE: &str = "https://api.openai.com";

/// Credentials and endpoints for one run. Constructed once and passed to
/// each stage explicitly; there is no process-wide client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile_bearer_token: String,
    pub llm_api_key: String,
    pub profile_api_base: String,
    pub llm_api_base: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Reads configuration from the environment. The optional
    /// `POSTLENS_PROFILE_API_BASE` / `POSTLENS_LLM_API_BASE` overrides
    /// exist so integration tests can point at a local mock server.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile_bearer_token = require_env(PROFILE_TOKEN_VAR)?;
        let llm_api_key = require_env(LLM_KEY_VAR)?;

        Ok(Self {
            profile_bearer_token,
            llm_api_key,
            profile_api_base: std::env::var("POSTLENS_PROFILE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_PROFILE_API_BASE.to_string()),
            llm_api_base: std::env::var("POSTLENS_LLM_API_BASE")
                .unwrap_or_else(|_| DEFAULT_LLM_API_BASE.to_string()),
            request_timeout_secs: 30,
        })
    }
}

fn require_env(var_name: &str) -> Result<String, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }),
    }
}
