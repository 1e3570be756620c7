// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Client - Priority Failover behind Per-Provider Circuit Breakers
//
// Presents one `generate` and one `generate_structured_output` call while
// hiding multi-provider failover. Providers are tried strictly in ascending
// priority order, never concurrently. Transport failures are charged to the
// serving provider's breaker; malformed or schema-invalid output is not.

use crate::domain::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use crate::domain::engine_config::LLMProviderConfig;
use crate::domain::llm::{GenerationOptions, LLMError, LLMProvider, LLMRequest, LLMResponse};
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// Sampling temperature used for structured output
const STRUCTURED_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Error)]
pub enum LLMClientError {
    /// Every provider was skipped by its breaker or failed. Fatal, never retried.
    #[error("All LLM providers unavailable (attempted: [{}], skipped: [{}]){}",
        .attempted.join(", "),
        .skipped.join(", "),
        .last_error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default())]
    AllProvidersUnavailable {
        attempted: Vec<String>,
        skipped: Vec<String>,
        last_error: Option<String>,
    },

    #[error("Provider '{provider}' returned invalid JSON: {message}")]
    InvalidJsonOutput { provider: String, message: String },

    #[error("Provider '{provider}' output failed schema validation: {}", .errors.join("; "))]
    SchemaValidationFailed { provider: String, errors: Vec<String> },
}

/// A provider handed to the client at construction
pub struct RegisteredProvider {
    pub name: String,
    pub priority: u32,
    pub provider: Arc<dyn LLMProvider>,
}

impl RegisteredProvider {
    pub fn new(name: impl Into<String>, priority: u32, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            priority,
            provider,
        }
    }
}

#[derive(Clone)]
struct ProviderSlot {
    name: String,
    priority: u32,
    provider: Arc<dyn LLMProvider>,
    breaker: Arc<CircuitBreaker>,
}

/// Per-provider breaker view for operators
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub priority: u32,
    pub breaker: CircuitBreakerSnapshot,
}

pub struct LLMClient {
    providers: RwLock<Vec<ProviderSlot>>,
    breaker_config: CircuitBreakerConfig,
}

impl LLMClient {
    pub fn new(providers: Vec<RegisteredProvider>, breaker_config: CircuitBreakerConfig) -> Self {
        let mut slots: Vec<ProviderSlot> = providers
            .into_iter()
            .map(|p| ProviderSlot {
                breaker: Arc::new(CircuitBreaker::new(p.name.clone(), breaker_config.clone())),
                name: p.name,
                priority: p.priority,
                provider: p.provider,
            })
            .collect();
        slots.sort_by_key(|slot| slot.priority);

        Self {
            providers: RwLock::new(slots),
            breaker_config,
        }
    }

    /// Build the client from provider configuration.
    ///
    /// Providers that fail to initialise (e.g. a missing API key) are logged
    /// and skipped so the remaining ones still serve traffic.
    pub fn from_config(
        configs: &[LLMProviderConfig],
        breaker_config: CircuitBreakerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing LLM client");

        let mut providers = Vec::new();
        for config in configs {
            if !config.enabled {
                info!("Provider '{}' disabled, skipping", config.name);
                continue;
            }

            match Self::create_provider(config) {
                Ok(provider) => {
                    info!(
                        provider = %config.name,
                        model = %config.model,
                        priority = config.priority,
                        "Registered LLM provider"
                    );
                    providers.push(RegisteredProvider::new(
                        config.name.clone(),
                        config.priority,
                        provider,
                    ));
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", config.name, e);
                }
            }
        }

        if providers.is_empty() {
            warn!("No LLM providers configured - generation requests will fail");
        }

        Ok(Self::new(providers, breaker_config))
    }

    fn create_provider(config: &LLMProviderConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = config.resolved_api_key()?.unwrap_or_default();

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
                config.timeout_secs,
                config.max_tokens,
            )),
            "anthropic" => Arc::new(AnthropicAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
                config.timeout_secs,
                config.max_tokens,
            )),
            "ollama" => Arc::new(OllamaAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                config.model.clone(),
                config.timeout_secs,
                config.max_tokens,
            )),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    /// Register a provider at runtime.
    ///
    /// Existing breakers keep their state. Re-registering a known name swaps
    /// the adapter but keeps its breaker.
    pub fn add_provider(&self, name: impl Into<String>, priority: u32, provider: Arc<dyn LLMProvider>) {
        let name = name.into();
        let mut slots = self.providers.write();

        if let Some(slot) = slots.iter_mut().find(|slot| slot.name == name) {
            slot.priority = priority;
            slot.provider = provider;
        } else {
            slots.push(ProviderSlot {
                breaker: Arc::new(CircuitBreaker::new(name.clone(), self.breaker_config.clone())),
                name,
                priority,
                provider,
            });
        }
        slots.sort_by_key(|slot| slot.priority);
    }

    /// Provider names in failover order
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.read().iter().map(|slot| slot.name.clone()).collect()
    }

    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.providers
            .read()
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| slot.breaker.clone())
    }

    fn snapshot(&self) -> Vec<ProviderSlot> {
        self.providers.read().clone()
    }

    /// Generate with priority failover.
    pub async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, LLMClientError> {
        let slots = self.snapshot();
        let mut attempted = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error = None;

        for slot in &slots {
            if !slot.breaker.can_execute().await {
                debug!(provider = %slot.name, "Circuit open, skipping provider");
                skipped.push(slot.name.clone());
                continue;
            }

            attempted.push(slot.name.clone());
            match slot.provider.generate(request).await {
                Ok(response) => {
                    slot.breaker.record_success().await;
                    metrics::counter!(
                        "gtm_llm_provider_successes_total",
                        "provider" => slot.name.clone()
                    )
                    .increment(1);
                    if attempted.len() > 1 {
                        info!(
                            provider = %slot.name,
                            attempts = attempted.len(),
                            "LLM request served after failover"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    slot.breaker.record_failure().await;
                    metrics::counter!(
                        "gtm_llm_provider_failures_total",
                        "provider" => slot.name.clone()
                    )
                    .increment(1);
                    warn!(provider = %slot.name, error = %e, "LLM provider failed, trying next");
                    last_error = Some(format!("{}: {}", slot.name, e));
                }
            }
        }

        error!(
            attempted = attempted.len(),
            skipped = skipped.len(),
            "All LLM providers unavailable"
        );
        Err(LLMClientError::AllProvidersUnavailable {
            attempted,
            skipped,
            last_error,
        })
    }

    /// Generate a response validated against the JSON schema of `T`.
    ///
    /// Parse and validation failures are terminal for the call and are
    /// never charged to the serving provider's breaker.
    pub async fn generate_structured_output<T>(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<T, LLMClientError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = response_schema::<T>();
        let instructed = format!(
            "{}\n\nRespond ONLY with a single JSON object that conforms to the following JSON schema. \
             Do not add commentary before or after the JSON.\n```json\n{}\n```",
            prompt,
            serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
        );

        let mut request = LLMRequest::new(instructed)
            .with_options(GenerationOptions {
                temperature: Some(STRUCTURED_TEMPERATURE),
                ..GenerationOptions::default()
            })
            .with_response_schema(schema.clone());
        if let Some(system) = system_prompt {
            request = request.with_system_prompt(system);
        }

        let response = self.generate(&request).await?;
        parse_structured(&response, &schema)
    }

    pub async fn health_report(&self) -> Vec<ProviderHealth> {
        let slots = self.snapshot();
        let mut report = Vec::with_capacity(slots.len());
        for slot in &slots {
            report.push(ProviderHealth {
                name: slot.name.clone(),
                priority: slot.priority,
                breaker: slot.breaker.snapshot().await,
            });
        }
        report
    }

    /// Probe every provider. Operator tooling only; does not touch breakers.
    pub async fn health_check_all(&self) -> Vec<(String, Result<(), LLMError>)> {
        let slots = self.snapshot();
        let mut results = Vec::with_capacity(slots.len());
        for slot in &slots {
            info!("Health checking provider: {}", slot.name);
            results.push((slot.name.clone(), slot.provider.health_check().await));
        }
        results
    }
}

/// JSON schema for `T`, as sent to the model and enforced on its output
pub fn response_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Bool(true))
}

fn parse_structured<T: DeserializeOwned>(
    response: &LLMResponse,
    schema: &Value,
) -> Result<T, LLMClientError> {
    let provider = response.provider.clone();
    let candidate = extract_json(&response.text);

    let value: Value = serde_json::from_str(&candidate).map_err(|e| {
        debug!(provider = %provider, error = %e, "LLM output is not valid JSON");
        LLMClientError::InvalidJsonOutput {
            provider: provider.clone(),
            message: e.to_string(),
        }
    })?;

    let validator = jsonschema::validator_for(schema).map_err(|e| {
        LLMClientError::SchemaValidationFailed {
            provider: provider.clone(),
            errors: vec![format!("invalid response schema: {}", e)],
        }
    })?;

    let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        debug!(provider = %provider, errors = errors.len(), "LLM output failed schema validation");
        return Err(LLMClientError::SchemaValidationFailed { provider, errors });
    }

    serde_json::from_value(value).map_err(|e| LLMClientError::SchemaValidationFailed {
        provider,
        errors: vec![e.to_string()],
    })
}

/// Pull the JSON document out of a model reply.
///
/// Prefers a ```json fence, then any fence, then the outermost braces.
pub fn extract_json(text: &str) -> String {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                return text[content_start..content_start + end_offset].trim().to_string();
            }
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::circuit_breaker::CircuitState;
    use crate::domain::llm::FinishReason;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(&self, _request: &LLMRequest) -> Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(LLMResponse {
                    text: text.to_string(),
                    usage: None,
                    provider: self.name.to_string(),
                    model: "scripted".to_string(),
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(LLMError::Network("connection refused".into())),
            }
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn config(threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_secs: 300,
            disable: false,
        }
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Company {
        name: String,
        employees: u32,
    }

    #[tokio::test]
    async fn test_failover_to_next_priority() {
        let p1 = ScriptedProvider::failing("p1");
        let p2 = ScriptedProvider::ok("p2", "hello");
        let client = LLMClient::new(
            vec![
                RegisteredProvider::new("p2", 2, p2.clone()),
                RegisteredProvider::new("p1", 1, p1.clone()),
            ],
            config(5),
        );

        assert_eq!(client.provider_names(), vec!["p1", "p2"]);

        let response = client.generate(&LLMRequest::new("hi")).await.unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(response.provider, "p2");

        let b1 = client.breaker("p1").unwrap().snapshot().await;
        let b2 = client.breaker("p2").unwrap().snapshot().await;
        assert_eq!(b1.failure_count, 1);
        assert_eq!(b1.total_failures, 1);
        assert_eq!(b2.total_successes, 1);
        assert_eq!(b2.failure_count, 0);
    }

    #[tokio::test]
    async fn test_all_providers_exhausted() {
        let client = LLMClient::new(
            vec![
                RegisteredProvider::new("a", 1, ScriptedProvider::failing("a")),
                RegisteredProvider::new("b", 2, ScriptedProvider::failing("b")),
            ],
            config(5),
        );

        match client.generate(&LLMRequest::new("hi")).await {
            Err(LLMClientError::AllProvidersUnavailable {
                attempted,
                last_error,
                ..
            }) => {
                assert_eq!(attempted, vec!["a", "b"]);
                assert!(last_error.unwrap().starts_with("b:"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        for name in ["a", "b"] {
            assert_eq!(client.breaker(name).unwrap().failure_count().await, 1);
        }
    }

    #[tokio::test]
    async fn test_no_providers_is_unavailable() {
        let client = LLMClient::new(Vec::new(), config(5));
        let err = client.generate(&LLMRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, LLMClientError::AllProvidersUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_open_breaker_is_skipped() {
        let p1 = ScriptedProvider::failing("p1");
        let p2 = ScriptedProvider::ok("p2", "ok");
        let client = LLMClient::new(
            vec![
                RegisteredProvider::new("p1", 1, p1.clone()),
                RegisteredProvider::new("p2", 2, p2.clone()),
            ],
            config(1),
        );

        client.generate(&LLMRequest::new("hi")).await.unwrap();
        assert_eq!(client.breaker("p1").unwrap().state().await, CircuitState::Open);

        client.generate(&LLMRequest::new("hi")).await.unwrap();
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 2);
    }

    #[tokio::test]
    async fn test_add_provider_keeps_existing_breakers() {
        let client = LLMClient::new(
            vec![RegisteredProvider::new("p1", 5, ScriptedProvider::failing("p1"))],
            config(5),
        );
        let _ = client.generate(&LLMRequest::new("hi")).await;
        let breaker_before = client.breaker("p1").unwrap();

        client.add_provider("p0", 1, ScriptedProvider::ok("p0", "ok"));

        assert_eq!(client.provider_names(), vec!["p0", "p1"]);
        let breaker_after = client.breaker("p1").unwrap();
        assert!(Arc::ptr_eq(&breaker_before, &breaker_after));
        assert_eq!(breaker_after.failure_count().await, 1);
        assert_eq!(client.breaker("p0").unwrap().failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_structured_output_parses_fenced_json() {
        let client = LLMClient::new(
            vec![RegisteredProvider::new(
                "p",
                1,
                ScriptedProvider::ok("p", "Sure!\n```json\n{\"name\": \"Acme\", \"employees\": 40}\n```"),
            )],
            config(5),
        );

        let company: Company = client
            .generate_structured_output("Describe Acme", Some("system"))
            .await
            .unwrap();
        assert_eq!(company.name, "Acme");
        assert_eq!(company.employees, 40);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_a_provider_failure() {
        let client = LLMClient::new(
            vec![RegisteredProvider::new("p", 1, ScriptedProvider::ok("p", "no json here"))],
            config(1),
        );

        let err = client
            .generate_structured_output::<Company>("Describe Acme", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LLMClientError::InvalidJsonOutput { .. }));

        let snapshot = client.breaker("p").unwrap().snapshot().await;
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.total_successes, 1);
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_distinct_error() {
        let p = ScriptedProvider::ok("p", r#"{"name": "Acme", "employees": "many"}"#);
        let fallback = ScriptedProvider::ok("q", r#"{"name": "Acme", "employees": 1}"#);
        let client = LLMClient::new(
            vec![
                RegisteredProvider::new("p", 1, p.clone()),
                RegisteredProvider::new("q", 2, fallback.clone()),
            ],
            config(1),
        );

        match client
            .generate_structured_output::<Company>("Describe Acme", None)
            .await
        {
            Err(LLMClientError::SchemaValidationFailed { provider, errors }) => {
                assert_eq!(provider, "p");
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(fallback.calls(), 0);
        assert_eq!(client.breaker("p").unwrap().failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_health_report_lists_providers_in_order() {
        let client = LLMClient::new(
            vec![
                RegisteredProvider::new("b", 2, ScriptedProvider::ok("b", "x")),
                RegisteredProvider::new("a", 1, ScriptedProvider::ok("a", "x")),
            ],
            config(5),
        );
        let report = client.health_report().await;
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].name, "a");
        assert_eq!(report[0].breaker.state, CircuitState::Closed);

        let checks = client.health_check_all().await;
        assert!(checks.iter().all(|(_, result)| result.is_ok()));
    }

    #[test]
    fn test_from_config_skips_unusable_providers() {
        let configs = vec![
            LLMProviderConfig {
                name: "needs-key".into(),
                provider_type: "openai".into(),
                endpoint: String::new(),
                api_key: Some("env:AEGIS_GTM_TEST_UNSET_KEY_7F3A".into()),
                model: "gpt-4o".into(),
                priority: 1,
                enabled: true,
                timeout_secs: 30,
                max_tokens: 1024,
            },
            LLMProviderConfig {
                name: "local".into(),
                provider_type: "ollama".into(),
                endpoint: "http://localhost:11434".into(),
                api_key: None,
                model: "llama3.2".into(),
                priority: 2,
                enabled: true,
                timeout_secs: 30,
                max_tokens: 1024,
            },
            LLMProviderConfig {
                name: "off".into(),
                provider_type: "ollama".into(),
                endpoint: "http://localhost:11434".into(),
                api_key: None,
                model: "llama3.2".into(),
                priority: 0,
                enabled: false,
                timeout_secs: 30,
                max_tokens: 1024,
            },
        ];

        let client = LLMClient::from_config(&configs, CircuitBreakerConfig::default()).unwrap();
        assert_eq!(client.provider_names(), vec!["local"]);
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("Here you go: {\"a\":{\"b\":2}} thanks"), "{\"a\":{\"b\":2}}");
        assert_eq!(extract_json("  plain  "), "plain");
    }
}
