//! Travel planner LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for any endpoint speaking the
//! OpenAI chat-completions protocol, including Azure OpenAI deployments.
//! Additional providers are added as new `impl` blocks in this crate without
//! any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response parsing,
//! `Retry-After` handling, and exponential back-off live here. The
//! [`pipeline`] crate sees only [`pipeline::LlmProvider`].

mod openai;

pub use openai::{AuthScheme, LlmConfig, LlmSetupError, OpenAiCompatibleProvider};
