// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Analysis Service
//!
//! Application service behind the generation endpoints. Each analysis:
//!
//! 1. resolves context ([`ContextResolver`]), or for `product_overview`
//!    fetches website content directly
//! 2. preprocesses website content into prompt-ready text
//! 3. assembles the endpoint's prompt variables and renders its templates
//! 4. calls [`LLMClient::generate_structured_output`] for the response type
//!
//! # Error mapping
//!
//! | Failure | `AnalysisError` | Status |
//! |---------|-----------------|--------|
//! | missing website URL | `MissingInput` | 422 |
//! | no sufficient context | `InsufficientContext` | 422 |
//! | URL validation failed | `InvalidWebsite` | 422 |
//! | unparseable LLM output | `InvalidLlmOutput` | 422 |
//! | schema mismatch | `SchemaValidation` | 422 |
//! | anything else | `Failed` | 500 |

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::context_resolver::ContextResolver;
use crate::domain::analysis::{
    AnalysisError, AnalysisRequest, AnalysisType, EmailGenerationResponse, ProductOverviewResponse,
    TargetAccountResponse, TargetPersonaResponse,
};
use crate::domain::context::{ContextEnvelope, ContextOutcome, ContextSource};
use crate::domain::website::FetchError;
use crate::infrastructure::content_fetcher::ContentFetcher;
use crate::infrastructure::llm::{LLMClient, LLMClientError};
use crate::infrastructure::prompt_template_engine::PromptTemplateEngine;

#[derive(Debug, Serialize)]
pub struct ProductOverviewVariables {
    pub website_url: String,
    pub website_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// Variables for stages that run on resolved context
#[derive(Debug, Serialize)]
pub struct ContextualVariables {
    pub context_source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailVariables {
    #[serde(flatten)]
    pub context: ContextualVariables,
    pub tone: String,
    pub email_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

pub struct AnalysisService {
    llm: Arc<LLMClient>,
    fetcher: Arc<ContentFetcher>,
    resolver: Arc<ContextResolver>,
    templates: Arc<PromptTemplateEngine>,
}

impl AnalysisService {
    pub fn new(
        llm: Arc<LLMClient>,
        fetcher: Arc<ContentFetcher>,
        resolver: Arc<ContextResolver>,
        templates: Arc<PromptTemplateEngine>,
    ) -> Self {
        Self {
            llm,
            fetcher,
            resolver,
            templates,
        }
    }

    /// Render `template_name` with `variables` and generate a response of
    /// type `R`, validated against its JSON schema.
    pub async fn analyze<V, R>(
        &self,
        analysis_type: AnalysisType,
        template_name: &str,
        variables: &V,
    ) -> Result<R, AnalysisError>
    where
        V: Serialize,
        R: DeserializeOwned + JsonSchema,
    {
        let prompt = self
            .templates
            .render_named(template_name, variables)
            .map_err(|e| {
                error!(analysis_type = %analysis_type, error = %e, "Prompt rendering failed");
                AnalysisError::Failed {
                    analysis_type,
                    message: format!("prompt rendering failed: {}", e),
                }
            })?;

        info!(
            analysis_type = %analysis_type,
            template = template_name,
            prompt_chars = prompt.user.len(),
            "Running analysis"
        );

        self.llm
            .generate_structured_output::<R>(&prompt.user, Some(&prompt.system))
            .await
            .map_err(|e| llm_error(analysis_type, e))
    }

    pub async fn product_overview(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ProductOverviewResponse, AnalysisError> {
        let analysis_type = AnalysisType::ProductOverview;
        let url = request.website().ok_or(AnalysisError::MissingInput {
            analysis_type,
            field: "website_url",
        })?;

        let processed = self
            .fetcher
            .get_processed_content(url, false)
            .await
            .map_err(|e| fetch_error(analysis_type, url, e))?;

        let variables = ProductOverviewVariables {
            website_url: url.to_string(),
            website_content: processed.text,
            additional_context: non_blank(&request.additional_context),
        };
        self.analyze(analysis_type, analysis_type.template_name(), &variables)
            .await
    }

    pub async fn target_account(
        &self,
        request: &AnalysisRequest,
    ) -> Result<TargetAccountResponse, AnalysisError> {
        let analysis_type = AnalysisType::TargetAccount;
        let variables = self.contextual_variables(analysis_type, request).await?;
        self.analyze(analysis_type, analysis_type.template_name(), &variables)
            .await
    }

    pub async fn target_persona(
        &self,
        request: &AnalysisRequest,
    ) -> Result<TargetPersonaResponse, AnalysisError> {
        let analysis_type = AnalysisType::TargetPersona;
        let variables = self.contextual_variables(analysis_type, request).await?;
        self.analyze(analysis_type, analysis_type.template_name(), &variables)
            .await
    }

    pub async fn email_generation(
        &self,
        request: &AnalysisRequest,
    ) -> Result<EmailGenerationResponse, AnalysisError> {
        let analysis_type = AnalysisType::EmailGeneration;
        let context = self.contextual_variables(analysis_type, request).await?;
        let preferences = request.preferences.clone().unwrap_or_default();

        let variables = EmailVariables {
            context,
            tone: preferences.tone,
            email_count: preferences.email_count.max(1),
            call_to_action: preferences
                .call_to_action
                .filter(|cta| !cta.trim().is_empty()),
        };
        self.analyze(analysis_type, analysis_type.template_name(), &variables)
            .await
    }

    /// Run an analysis by type, returning the response as JSON
    pub async fn run(
        &self,
        analysis_type: AnalysisType,
        request: &AnalysisRequest,
    ) -> Result<Value, AnalysisError> {
        let to_json = |result: Result<Value, serde_json::Error>| {
            result.map_err(|e| AnalysisError::Failed {
                analysis_type,
                message: e.to_string(),
            })
        };

        match analysis_type {
            AnalysisType::ProductOverview => {
                to_json(serde_json::to_value(self.product_overview(request).await?))
            }
            AnalysisType::TargetAccount => {
                to_json(serde_json::to_value(self.target_account(request).await?))
            }
            AnalysisType::TargetPersona => {
                to_json(serde_json::to_value(self.target_persona(request).await?))
            }
            AnalysisType::EmailGeneration => {
                to_json(serde_json::to_value(self.email_generation(request).await?))
            }
        }
    }

    async fn contextual_variables(
        &self,
        analysis_type: AnalysisType,
        request: &AnalysisRequest,
    ) -> Result<ContextualVariables, AnalysisError> {
        let envelope = self.resolve(analysis_type, request).await?;

        let context = envelope
            .context
            .as_ref()
            .map(|value| serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));

        let website_content = match (envelope.source, request.website()) {
            (ContextSource::Website, Some(url)) => {
                let raw = envelope.content.as_deref().unwrap_or_default();
                let raw = if raw.trim().is_empty() {
                    envelope.html.as_deref().unwrap_or_default()
                } else {
                    raw
                };
                Some(self.fetcher.prepare_text(url, raw).await.text)
            }
            _ => None,
        };

        Ok(ContextualVariables {
            context_source: envelope.source.as_str(),
            context,
            website_content,
            hypothesis: non_blank(&request.hypothesis),
            additional_context: non_blank(&request.additional_context),
        })
    }

    async fn resolve(
        &self,
        analysis_type: AnalysisType,
        request: &AnalysisRequest,
    ) -> Result<ContextEnvelope, AnalysisError> {
        let Some(stage) = analysis_type.required_stage() else {
            return Err(AnalysisError::Failed {
                analysis_type,
                message: "analysis type does not run on resolved context".to_string(),
            });
        };

        let outcome = self
            .resolver
            .resolve(stage, request)
            .await
            .map_err(|e| fetch_error(analysis_type, request.website().unwrap_or_default(), e))?;

        match outcome {
            ContextOutcome::Ready(envelope) => Ok(envelope),
            ContextOutcome::NotReady {
                stage,
                missing,
                recommendations,
            } => {
                warn!(
                    analysis_type = %analysis_type,
                    stage = %stage,
                    missing = ?missing,
                    "Insufficient context"
                );
                Err(AnalysisError::InsufficientContext {
                    analysis_type,
                    stage,
                    missing,
                    recommendations,
                })
            }
        }
    }
}

fn llm_error(analysis_type: AnalysisType, err: LLMClientError) -> AnalysisError {
    match err {
        LLMClientError::InvalidJsonOutput { message, .. } => AnalysisError::InvalidLlmOutput {
            analysis_type,
            message,
        },
        LLMClientError::SchemaValidationFailed { errors, .. } => AnalysisError::SchemaValidation {
            analysis_type,
            errors,
        },
        other @ LLMClientError::AllProvidersUnavailable { .. } => {
            error!(analysis_type = %analysis_type, error = %other, "Analysis failed");
            AnalysisError::Failed {
                analysis_type,
                message: other.to_string(),
            }
        }
    }
}

fn fetch_error(analysis_type: AnalysisType, url: &str, err: FetchError) -> AnalysisError {
    match err {
        FetchError::Validation(validation) => AnalysisError::InvalidWebsite {
            analysis_type,
            url: url.to_string(),
            reason: validation
                .reason
                .unwrap_or_else(|| "URL validation failed".to_string()),
        },
        scrape if scrape.is_website_error() => {
            warn!(analysis_type = %analysis_type, url = %url, error = %scrape, "Website could not be scraped");
            AnalysisError::InvalidWebsite {
                analysis_type,
                url: url.to_string(),
                reason: scrape.reason(),
            }
        }
        scrape @ FetchError::Scrape(_) => {
            error!(analysis_type = %analysis_type, url = %url, error = %scrape, "Website fetch failed");
            AnalysisError::Failed {
                analysis_type,
                message: scrape.reason(),
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
