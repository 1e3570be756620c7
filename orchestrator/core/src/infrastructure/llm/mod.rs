// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `LLMProvider` interface and one
// vendor API. `LLMClient` layers priority failover, per-provider circuit
// breakers and structured output on top of them.

pub mod anthropic;
pub mod client;
pub mod ollama;
pub mod openai;

pub use client::{LLMClient, LLMClientError, ProviderHealth, RegisteredProvider};

use crate::domain::llm::LLMError;
use std::time::Duration;

/// HTTP client bounded by the provider's request timeout
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            reqwest::Client::new()
        })
}

/// Map a reqwest transport failure into the domain taxonomy
pub(crate) fn transport_error(err: reqwest::Error, timeout_secs: u64) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout(timeout_secs)
    } else {
        LLMError::Network(err.to_string())
    }
}

/// Read a failed response body and map its status
pub(crate) async fn status_error(response: reqwest::Response, model: &str) -> LLMError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    LLMError::from_status(status, body, model)
}
