// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, Azure gateways).

use super::{http_client, status_error, transport_error};
use crate::domain::llm::{
    FinishReason, LLMError, LLMProvider, LLMRequest, LLMResponse, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_tokens: u32,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: http_client(timeout_secs),
            name: name.into(),
            endpoint: if endpoint.trim().is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs,
            max_tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError> {
        if request.user_prompt.trim().is_empty() {
            return Err(LLMError::InvalidInput("empty prompt".into()));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.user_prompt.clone()),
        });

        let options = &request.options;
        let body = OpenAIRequest {
            model: &self.model,
            messages,
            max_tokens: Some(options.max_tokens.unwrap_or(self.max_tokens).min(self.max_tokens)),
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
            response_format: request
                .wants_json()
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response, &self.model).await);
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        Ok(LLMResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: openai_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            provider: self.name.clone(),
            model: openai_response.model.unwrap_or_else(|| self.model.clone()),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response, &self.model).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn adapter(endpoint: String) -> OpenAIAdapter {
        OpenAIAdapter::new("openai-primary", endpoint, "sk-test", "gpt-4o", 5, 1024)
    }

    #[tokio::test]
    async fn test_generate_sends_system_prompt_and_json_mode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "You are a marketer"},
                    {"role": "user", "content": "Describe acme"}
                ],
                "response_format": {"type": "json_object"},
                "max_tokens": 1024
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "gpt-4o-2024-08-06",
                    "choices": [{
                        "message": {"role": "assistant", "content": "{\"ok\":true}"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = LLMRequest::new("Describe acme")
            .with_system_prompt("You are a marketer")
            .with_response_schema(json!({"type": "object"}));
        let response = adapter(server.url()).generate(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "{\"ok\":true}");
        assert_eq!(response.provider, "openai-primary");
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_generate_maps_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = adapter(server.url())
            .generate(&LLMRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::RateLimit));
    }

    #[tokio::test]
    async fn test_empty_choices_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = adapter(server.url())
            .generate(&LLMRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Provider(_)));
    }

    #[tokio::test]
    async fn test_health_check_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(401)
            .with_body("invalid key")
            .create_async()
            .await;

        let err = adapter(server.url()).health_check().await.unwrap_err();
        assert!(matches!(err, LLMError::Authentication(_)));
    }
}
