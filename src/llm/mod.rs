//! LLM Adapter (C6): provider-agnostic prompt submission and response
//! parsing (spec §4.6). Provider differences (auth header, body shape)
//! are resolved by a variant tag dispatching into a small fn table
//! inside one adapter, per spec §9's "provider polymorphism via variant
//! tag + fn table" design note — not by a trait impl per provider.

use async_trait::async_trait;
use serde_json::json;

use crate::config::LlmProviderKind;
use crate::error::{LlmError, LlmErrorKind};
use crate::retry::{retry_with_backoff, BackoffPolicy};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct LlmOptions {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub performance_mode: bool,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            performance_mode: false,
        }
    }
}

impl LlmOptions {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.max_tokens = self.max_tokens.clamp(100, 4000);
        self
    }
}

#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn generate(&self, prompt: &str, options: &LlmOptions) -> Result<String, LlmError>;
}

struct ProviderRequest {
    url: String,
    headers: Vec<(&'static str, String)>,
    body: serde_json::Value,
}

fn model_for(provider: LlmProviderKind, performance_mode: bool, override_model: Option<&str>) -> String {
    if let Some(model) = override_model {
        return model.to_string();
    }
    match (provider, performance_mode) {
        (LlmProviderKind::Openai, false) => "gpt-4o".to_string(),
        (LlmProviderKind::Openai, true) => "gpt-4o-mini".to_string(),
        (LlmProviderKind::Anthropic, false) => "claude-3-5-sonnet".to_string(),
        (LlmProviderKind::Anthropic, true) => "claude-3-5-haiku".to_string(),
        (LlmProviderKind::Gemini, false) => "gemini-1.5-pro".to_string(),
        (LlmProviderKind::Gemini, true) => "gemini-1.5-flash".to_string(),
    }
}

fn build_request(
    provider: LlmProviderKind,
    api_key: &str,
    prompt: &str,
    options: &LlmOptions,
) -> ProviderRequest {
    let model = model_for(provider, options.performance_mode, options.model.as_deref());
    match provider {
        LlmProviderKind::Openai => ProviderRequest {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            headers: vec![("Authorization", format!("Bearer {api_key}"))],
            body: json!({
                "model": model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": options.temperature,
                "max_tokens": options.max_tokens,
            }),
        },
        LlmProviderKind::Anthropic => ProviderRequest {
            url: "https://api.anthropic.com/v1/messages".to_string(),
            headers: vec![("x-api-key", api_key.to_string()), ("anthropic-version", "2023-06-01".to_string())],
            body: json!({
                "model": model,
                "max_tokens": options.max_tokens,
                "temperature": options.temperature,
                "messages": [{"role": "user", "content": prompt}],
            }),
        },
        LlmProviderKind::Gemini => ProviderRequest {
            url: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent?key={api_key}"
            ),
            headers: vec![],
            body: json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {
                    "temperature": options.temperature,
                    "maxOutputTokens": options.max_tokens,
                },
            }),
        },
    }
}

fn extract_text(provider: LlmProviderKind, body: &serde_json::Value) -> Option<String> {
    match provider {
        LlmProviderKind::Openai => body
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string),
        LlmProviderKind::Anthropic => body
            .get("content")?
            .get(0)?
            .get("text")?
            .as_str()
            .map(str::to_string),
        LlmProviderKind::Gemini => body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .get(0)?
            .get("text")?
            .as_str()
            .map(str::to_string),
    }
}

/// HTTP-backed adapter dispatching on `provider` via [`build_request`]
/// and [`extract_text`] rather than a distinct impl per provider.
pub struct HttpLlmAdapter {
    client: reqwest::Client,
    provider: LlmProviderKind,
    api_key: String,
}

impl HttpLlmAdapter {
    #[must_use]
    pub fn new(provider: LlmProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            api_key: api_key.into(),
        }
    }

    async fn call_once(&self, prompt: &str, options: &LlmOptions) -> Result<String, LlmError> {
        let request = build_request(self.provider, &self.api_key, prompt, options);
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(std::time::Duration::from_secs(options.timeout_seconds))
            .json(&request.body);
        for (key, value) in &request.headers {
            builder = builder.header(*key, value);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                LlmError::new(LlmErrorKind::Timeout, err.to_string())
            } else {
                LlmError::new(LlmErrorKind::InvalidResponse, err.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::new(LlmErrorKind::Auth, format!("provider rejected credentials: {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(LlmError::new(LlmErrorKind::RateLimit, "provider quota exceeded")
                .with_retry_after(retry_after));
        }
        if status.is_client_error() {
            return Err(LlmError::new(LlmErrorKind::InvalidResponse, format!("client error: {status}")));
        }
        if status.is_server_error() {
            return Err(LlmError::new(LlmErrorKind::Timeout, format!("server error: {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| LlmError::new(LlmErrorKind::InvalidResponse, err.to_string()))?;

        extract_text(self.provider, &body)
            .ok_or_else(|| LlmError::new(LlmErrorKind::InvalidResponse, "no text content in provider response"))
    }
}

#[async_trait]
impl LlmAdapter for HttpLlmAdapter {
    async fn generate(&self, prompt: &str, options: &LlmOptions) -> Result<String, LlmError> {
        let options = options.clone().clamped();
        let policy = BackoffPolicy::default();
        retry_with_backoff(
            policy,
            |_attempt| self.call_once(prompt, &options),
            |err| matches!(err.kind, LlmErrorKind::Timeout),
        )
        .await
    }
}

/// Extracts the last `weather:`/`advice:` labeled pair from `text`,
/// tolerating surrounding prose (spec §4.6 Parsing).
#[must_use]
pub fn parse_labeled_reply(text: &str) -> Option<(String, String)> {
    let mut weather = None;
    let mut advice = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = strip_label(trimmed, "weather:") {
            weather = Some(rest);
        } else if let Some(rest) = strip_label(trimmed, "advice:") {
            advice = Some(rest);
        }
    }
    Some((weather?, advice?))
}

fn strip_label(line: &str, label: &str) -> Option<String> {
    let lower = line.to_lowercase();
    if lower.starts_with(label) {
        Some(line[label.len()..].trim().to_string())
    } else {
        None
    }
}
