//! OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, RetryPolicy};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Largest share of an error body kept in [`LlmError::Http`].
const ERROR_BODY_CHARS: usize = 500;

/// How the API key is presented to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (OpenAI and most compatible gateways).
    #[default]
    Bearer,
    /// `api-key: <key>` (Azure OpenAI).
    ApiKey,
}

/// Connection settings for [`OpenAiCompatibleProvider`].
#[derive(Clone)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub auth: AuthScheme,
    /// Appended as the `api-version` query parameter when set.
    pub api_version: Option<String>,
    /// Per-attempt transport timeout.
    pub timeout: Duration,
    /// Total attempts per completion, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
    /// Longest wait between attempts. A `Retry-After` beyond it ends the
    /// call with the rate-limit error instead of waiting.
    pub max_retry_after: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            auth: AuthScheme::Bearer,
            api_version: None,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("max_retry_after", &self.max_retry_after)
            .finish()
    }
}

/// The provider could not be constructed.
#[derive(Debug, Error)]
pub enum LlmSetupError {
    /// The API key contains bytes that are not valid in an HTTP header.
    #[error("API key is not a valid header value")]
    InvalidApiKey,

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// An [`LlmProvider`] for any endpoint speaking the OpenAI chat-completions
/// protocol.
///
/// Retryable failures (see [`LlmError::retry_policy`]) are retried up to
/// [`LlmConfig::max_attempts`] times with exponential back-off; a provider
/// supplied `Retry-After` delay takes precedence over the schedule as long as
/// it does not exceed [`LlmConfig::max_retry_after`].
#[derive(Debug)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl OpenAiCompatibleProvider {
    /// Builds a provider with its default headers resolved up front.
    ///
    /// # Errors
    ///
    /// [`LlmSetupError`] if the key is not header-safe or the client fails to
    /// initialise its TLS backend.
    pub fn new(config: LlmConfig) -> Result<Self, LlmSetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let (name, value) = match config.auth {
                AuthScheme::Bearer => (AUTHORIZATION, format!("Bearer {key}")),
                AuthScheme::ApiKey => (HeaderName::from_static("api-key"), key.clone()),
            };
            let mut value =
                HeaderValue::from_str(&value).map_err(|_| LlmSetupError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn attempt(&self, body: &ChatRequest<'_>) -> Result<CompletionResponse, LlmError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(version) = &self.config.api_version {
            request = request.query(&[("api-version", version.as_str())]);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &text));
        }
        parse_completion(&text)
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(16);
        self.config
            .initial_backoff
            .saturating_mul(factor)
            .min(self.config.max_retry_after)
    }

    /// Wait before retry number `retry` (zero-based), or `None` when the
    /// provider asks for longer than the configured maximum.
    fn retry_delay(&self, suggested: Option<Duration>, retry: u32) -> Option<Duration> {
        match suggested {
            Some(after) if after > self.config.max_retry_after => None,
            Some(after) => Some(after),
            None => Some(self.backoff_for(retry)),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn describe(&self) -> String {
        format!("{} ({})", self.config.model, self.config.base_url)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest::from_request(&self.config.model, &request);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.attempt(&body).await {
                Ok(response) => {
                    debug!(attempt, model = ?response.model, "Completion received");
                    return Ok(response);
                }
                Err(err) => {
                    let after = match err.retry_policy() {
                        RetryPolicy::Retryable { after } if attempt < max_attempts => after,
                        _ => return Err(err),
                    };
                    let Some(delay) = self.retry_delay(after, attempt - 1) else {
                        warn!(
                            attempt,
                            requested_secs = after.map(|d| d.as_secs()),
                            max_secs = self.config.max_retry_after.as_secs(),
                            "Provider asked to wait longer than allowed; giving up"
                        );
                        return Err(err);
                    };
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    fn from_request(model: &'a str, request: &'a CompletionRequest) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn parse_completion(body: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    Ok(CompletionResponse {
        text,
        model: parsed.model,
    })
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited { retry_after };
    }
    LlmError::Http {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_CHARS).collect(),
    }
}

/// Parses the delta-seconds form of `Retry-After`. HTTP-date values are
/// ignored and fall back to the back-off schedule.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(err.to_string())
    }
}
