// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Text generation capability behind the judgment engine.
//!
//! Every prompt the cortex sends expects one of two reply shapes: a free-text
//! answer, or a single JSON document (insights, deltas, usage verdicts).
//! [`GenerationOptions::response_format`] carries that expectation so each
//! adapter can switch on its vendor's JSON mode. Adapters live in
//! `infrastructure::llm`.

use async_trait::async_trait;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<GenerationResponse, LLMError>;

    /// Reachability of the backend and availability of the bound model.
    async fn health_check(&self) -> Result<(), LLMError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The reply must be one JSON document
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub response_format: ResponseFormat,
}

impl Default for GenerationOptions {
    /// Answer generation: some sampling freedom, free-text reply.
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 2048,
            stop_sequences: Vec::new(),
            response_format: ResponseFormat::Text,
        }
    }
}

impl GenerationOptions {
    /// Reflection, curation and evaluation: near-deterministic JSON replies.
    pub fn structured() -> Self {
        Self {
            temperature: 0.2,
            response_format: ResponseFormat::Json,
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn expects_json(&self) -> bool {
        self.response_format == ResponseFormat::Json
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Adapter kind, e.g. "openai"
    pub provider: String,
    pub model: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Why the backend stopped producing tokens. Each adapter maps its own
/// vendor vocabulary onto this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut off by `max_tokens`; a JSON reply is probably incomplete
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn is_truncated(&self) -> bool {
        matches!(self, FinishReason::Length)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LLMError {
    /// Transient failures worth another attempt against the same backend.
    /// Credentials, missing models and bad input fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LLMError::Network(_) | LLMError::RateLimit | LLMError::Provider(_))
    }
}
