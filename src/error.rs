//! Error taxonomy shared across the engine.
//!
//! Each component boundary gets its own `thiserror` enum; `WorkflowError`
//! composes them the way a top-level error type gathers its collaborators'
//! errors. `code()` maps a variant to the stable string the API boundary
//! (spec §6.1) surfaces to callers.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherFetchErrorKind {
    Timeout,
    RateLimited,
    ApiKeyInvalid,
    Network,
    Unknown,
}

#[derive(Debug, Error)]
#[error("weather fetch failed ({kind:?}): {message}")]
pub struct WeatherFetchError {
    pub kind: WeatherFetchErrorKind,
    pub message: String,
}

impl WeatherFetchError {
    #[must_use]
    pub fn new(kind: WeatherFetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Timeout,
    RateLimit,
    InvalidResponse,
    Auth,
}

#[derive(Debug, Error)]
#[error("llm error ({kind:?}): {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// Advisory sleep hint in seconds, populated for rate-limit responses.
    pub retry_after_secs: Option<u64>,
}

impl LlmError {
    #[must_use]
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus directory not found: {0}")]
    CorpusNotFound(String),
    #[error("corpus io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),
    #[error("configuration value out of range: {0}")]
    OutOfRange(String),
}

/// Non-fatal: a cache error always demotes to a cache miss and never
/// propagates past the component that hit it.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache entry malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("location not found: {0}")]
    LocationNotFound(String),
    #[error(transparent)]
    WeatherFetch(#[from] WeatherFetchError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("validation failed: {0:?}")]
    ValidationFailed(Vec<String>),
    #[error("node timed out: {0}")]
    Timeout(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable error code per spec §6.1's error response shape.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::LocationNotFound(_) => "NOT_FOUND",
            Self::WeatherFetch(_) => "WEATHER_FETCH",
            Self::Corpus(_) => "INTERNAL",
            Self::Llm(err) => match err.kind {
                LlmErrorKind::RateLimit => "RATE_LIMIT",
                LlmErrorKind::Timeout => "TIMEOUT",
                LlmErrorKind::InvalidResponse | LlmErrorKind::Auth => "LLM_ERROR",
            },
            Self::ValidationFailed(_) => "INVALID_REQUEST",
            Self::Timeout(_) => "TIMEOUT",
            Self::Config(_) => "INTERNAL",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
