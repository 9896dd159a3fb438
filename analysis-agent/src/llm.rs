//! Chat-completion transport. The `ChatCompleter` trait is the seam the
//! agent is tested through; `OpenAiChat` is the production implementation.

use postlens_core::{AppConfig, CoreError, LlmError};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const LLM_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1500;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub trait ChatCompleter {
    /// Sends one system+user exchange and returns the model's text reply.
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug)]
pub struct OpenAiChat {
    http_client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        Self::with_base_url(
            &config.llm_api_key,
            config.request_timeout_secs,
            &config.llm_api_base,
        )
    }

    /// Client with a custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent("postlens/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid LLM API base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl ChatCompleter for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|_| LlmError::InvalidResponseFormat {
                provider: LLM_PROVIDER.to_string(),
            })?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(map_error_status(status, retry_after));
        }

        let body: ChatResponse =
            response
                .json()
                .await
                .map_err(|_| LlmError::InvalidResponseFormat {
                    provider: LLM_PROVIDER.to_string(),
                })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponseFormat {
                provider: LLM_PROVIDER.to_string(),
            })?;

        debug!("chat completion returned {} char(s)", content.len());
        Ok(content)
    }
}

fn classify_send_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::RequestTimeout {
            provider: LLM_PROVIDER.to_string(),
        }
    } else {
        LlmError::ServiceUnavailable {
            provider: LLM_PROVIDER.to_string(),
        }
    }
}

fn map_error_status(status: StatusCode, retry_after: u64) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationFailed {
            provider: LLM_PROVIDER.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider: LLM_PROVIDER.to_string(),
            retry_after,
        },
        _ => LlmError::ServiceUnavailable {
            provider: LLM_PROVIDER.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat(server: &MockServer) -> OpenAiChat {
        OpenAiChat::with_base_url("test-key", 5, &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "hi there" } }]
            })))
            .mount(&server)
            .await;

        let reply = chat(&server).complete("be brief", "hello").await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = chat(&server).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let err = chat(&server).complete("s", "u").await.unwrap_err();
        match err {
            LlmError::RateLimitExceeded { retry_after, .. } => {
                assert_eq!(retry_after, 30);
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = chat(&server).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponseFormat { .. }));
    }
}
