use crate::error::*;
use std::time::Duration;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::ProfileApi(e) => {
                error!("Profile API error details: {:?}", e);
            }
            CoreError::Llm(e) => {
                error!("LLM error details: {:?}", e);
            }
            CoreError::Embedding(e) => {
                error!("Embedding error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::ProfileApi(e) => e.is_retryable(),
            CoreError::Llm(e) => e.is_retryable(),
            CoreError::Embedding(e) => {
                matches!(e, EmbeddingError::RequestFailed { .. })
            }
            CoreError::Network(_) => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Llm(LlmError::RateLimitExceeded { retry_after, .. }) => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::ProfileApi(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Embedding(e) => format!("Embedding service problem: {}", e),
            CoreError::Config(e) => match e {
                ConfigError::MissingEnvironmentVariable { var_name } => format!(
                    "Missing credential: please set {} in your environment or .env file.",
                    var_name
                ),
                ConfigError::InvalidValue { field, value } => {
                    format!("Invalid configuration value for {}: {}", field, value)
                }
            },
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => {
                format!("Invalid input: {}", message)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::ProfileApi(_) => "PROFILE_API".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::Embedding(_) => "EMBEDDING".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for ProfileApiError {
    fn log_error(&self) -> &Self {
        error!("ProfileApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ProfileApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProfileApiError::TransientNetwork { .. }
                | ProfileApiError::RequestTimeout
                | ProfileApiError::ServerError { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(5))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ProfileApiError::ProfileNotFound { handle } => {
                format!("No profile found for @{}. Check the handle spelling.", handle)
            }
            ProfileApiError::PermissionDenied { handle } => {
                format!("@{}'s posts are protected and cannot be fetched.", handle)
            }
            ProfileApiError::RateLimitExceeded { .. } => {
                "The profile API rate limit was hit repeatedly. Try again later.".to_string()
            }
            ProfileApiError::TransientNetwork { .. } | ProfileApiError::RequestTimeout => {
                "The profile API could not be reached. Please retry.".to_string()
            }
            ProfileApiError::AuthenticationFailed { .. } => {
                "The profile API rejected the bearer token. Check your credentials.".to_string()
            }
            ProfileApiError::InvalidResponse { .. } => {
                "The profile API returned an unexpected response.".to_string()
            }
            ProfileApiError::ServerError { status_code } => {
                format!("The profile API reported a server error ({}).", status_code)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ProfileApiError::ProfileNotFound { .. } => "PROFILE_NOT_FOUND".to_string(),
            ProfileApiError::PermissionDenied { .. } => "PERMISSION_DENIED".to_string(),
            ProfileApiError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED".to_string(),
            ProfileApiError::TransientNetwork { .. } => "TRANSIENT_NETWORK".to_string(),
            ProfileApiError::AuthenticationFailed { .. } => "AUTH_FAILED".to_string(),
            ProfileApiError::RequestTimeout => "TIMEOUT".to_string(),
            ProfileApiError::InvalidResponse { .. } => "INVALID_RESPONSE".to_string(),
            ProfileApiError::ServerError { .. } => "SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn log_error(&self) -> &Self {
        error!("LlmError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("LlmError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimitExceeded { .. }
                | LlmError::ServiceUnavailable { .. }
                | LlmError::RequestTimeout { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::AnalysisUnavailable { category, .. } => {
                format!("The '{}' analysis could not be completed.", category)
            }
            LlmError::AuthenticationFailed { provider } => {
                format!("The {} API key was rejected. Check your credentials.", provider)
            }
            LlmError::RateLimitExceeded { provider, .. } => {
                format!("{} rate limit reached. Please wait before retrying.", provider)
            }
            LlmError::ServiceUnavailable { provider } | LlmError::RequestTimeout { provider } => {
                format!("{} is currently unavailable. Please retry later.", provider)
            }
            LlmError::InvalidResponseFormat { provider } => {
                format!("{} returned a response that could not be interpreted.", provider)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            LlmError::AnalysisUnavailable { .. } => "ANALYSIS_UNAVAILABLE".to_string(),
            LlmError::AuthenticationFailed { .. } => "LLM_AUTH_FAILED".to_string(),
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMITED".to_string(),
            LlmError::ServiceUnavailable { .. } => "LLM_UNAVAILABLE".to_string(),
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT".to_string(),
            LlmError::InvalidResponseFormat { .. } => "LLM_BAD_RESPONSE".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_side_errors_carry_stable_codes() {
        let err = CoreError::ProfileApi(ProfileApiError::ProfileNotFound {
            handle: "ghost".to_string(),
        });
        assert_eq!(err.error_code(), "PROFILE_API");
        assert_eq!(
            ProfileApiError::ProfileNotFound {
                handle: "ghost".to_string()
            }
            .error_code(),
            "PROFILE_NOT_FOUND"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limit_exceeded_is_not_retryable() {
        // Once the backoff ceiling is hit the run must fail, not loop.
        let err = ProfileApiError::RateLimitExceeded { waits: 2 };
        assert!(!err.is_retryable());
        assert!(err.retry_after().is_none());
    }

    #[test]
    fn llm_rate_limit_reports_retry_after() {
        let err = LlmError::RateLimitExceeded {
            provider: "openai".to_string(),
            retry_after: 30,
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn user_messages_name_the_handle() {
        let err = ProfileApiError::PermissionDenied {
            handle: "private_account".to_string(),
        };
        assert!(err.user_friendly_message().contains("private_account"));
    }
}
