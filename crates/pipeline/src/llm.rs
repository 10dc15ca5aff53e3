//! The LLM provider port.
//!
//! Agents that delegate text generation depend on [`LlmProvider`] only; the
//! `llm` crate supplies the HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RetryPolicy;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instructions describing the agent's role.
    pub system_prompt: String,
    /// The task, including any draft the model should refine.
    pub user_prompt: String,
    /// Sampling temperature; `None` uses the provider default.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens; `None` uses the provider default.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// The generated text of a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    /// Model that served the request, when reported.
    pub model: Option<String>,
}

/// Failure of an LLM call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    /// The request did not complete within the transport timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The provider rejected the request because of rate limits.
    #[error("LLM provider rate limited the request")]
    RateLimited {
        /// Delay suggested by the provider.
        retry_after: Option<std::time::Duration>,
    },

    /// The provider answered with an error status.
    #[error("LLM provider returned HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
    },

    /// The connection failed before a response arrived.
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// The response could not be interpreted.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    /// The provider returned no text.
    #[error("LLM response contained no content")]
    EmptyResponse,
}

impl LlmError {
    /// Classifies the error for the caller's retry loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            LlmError::Timeout | LlmError::Transport(_) => RetryPolicy::Retryable { after: None },
            LlmError::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            LlmError::Http { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            LlmError::Http { .. } | LlmError::MalformedResponse(_) | LlmError::EmptyResponse => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider/model label for logs.
    fn describe(&self) -> String;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
