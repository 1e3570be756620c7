// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-neutral request/response types for text generation.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption interface between the analysis pipeline and LLM vendors

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Every vendor adapter in infrastructure/llm/ implements `LLMProvider`.
// Failover, circuit breaking and structured output live in
// infrastructure/llm/client.rs, never inside an adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion.
    ///
    /// Transport and vendor failures must surface as `Err`; an adapter never
    /// returns a "successful" response for a failed call.
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError>;

    /// Check if provider is healthy and accessible.
    ///
    /// Operator tooling only. The generation path relies on circuit breakers.
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// A single generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    pub user_prompt: String,

    #[serde(default)]
    pub options: GenerationOptions,

    /// JSON schema the response must satisfy. Adapters switch the vendor
    /// into JSON mode when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl LLMRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            options: GenerationOptions::default(),
            response_schema: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// True when the caller expects a JSON document back
    pub fn wants_json(&self) -> bool {
        self.response_schema.is_some()
    }
}

/// Options for LLM generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated text
    pub text: String,

    /// Token usage stats, when the vendor reports them
    pub usage: Option<TokenUsage>,

    /// Name of the provider that served the call (e.g., "openai-primary")
    pub provider: String,

    /// Model used (e.g., "gpt-4o", "llama3.2")
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Transport-level failures raised by a single provider.
///
/// Every variant is charged against that provider's circuit breaker.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

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
    /// Map a non-success HTTP status into the error taxonomy
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 | 403 => LLMError::Authentication(body),
            429 => LLMError::RateLimit,
            404 => LLMError::ModelNotFound(model.to_string()),
            _ => LLMError::Provider(format!("HTTP {}: {}", status, body)),
        }
    }
}
