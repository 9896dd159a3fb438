use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Profile API error: {0}")]
    ProfileApi(#[from] ProfileApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum ProfileApiError {
    #[error("Profile not found: @{handle}")]
    ProfileNotFound { handle: String },

    #[error("Permission denied for @{handle}: profile is protected")]
    PermissionDenied { handle: String },

    #[error("Rate limit exceeded after {waits} backoff wait(s)")]
    RateLimitExceeded { waits: u32 },

    #[error("Transient network failure: {details}")]
    TransientNetwork { details: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Analysis unavailable for '{category}': {reason}")]
    AnalysisUnavailable { category: String, reason: String },

    #[error("Provider authentication failed: {provider}")]
    AuthenticationFailed { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },
}

#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No input texts to embed")]
    EmptyInput,
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
