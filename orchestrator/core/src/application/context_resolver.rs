// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Resolver
//!
//! Picks the context a generation stage runs on, trying sources in order:
//!
//! 1. user-inputted context, if sufficient for the stage
//! 2. LLM-inferred context, if sufficient for the stage
//! 3. website content, accepted as ready once fetched
//!
//! Exhausting every source yields [`ContextOutcome::NotReady`], which is a
//! normal return value. Website fetch failures are errors and stay distinct
//! from insufficiency.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::analysis::AnalysisRequest;
use crate::domain::context::{
    ContextEnvelope, ContextOutcome, ContextSource, ContextSufficiencyEvaluator, EndpointStage,
    GenerationContext,
};
use crate::domain::website::{FetchError, ScrapeFormat};
use crate::infrastructure::content_fetcher::ContentFetcher;

pub struct ContextResolver {
    fetcher: Arc<ContentFetcher>,
}

impl ContextResolver {
    pub fn new(fetcher: Arc<ContentFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(
        &self,
        stage: EndpointStage,
        request: &AnalysisRequest,
    ) -> Result<ContextOutcome, FetchError> {
        let candidates = [
            (ContextSource::UserInputted, request.user_inputted_context.as_ref()),
            (ContextSource::LlmInferred, request.llm_inferred_context.as_ref()),
        ];

        let mut last_report = None;
        for (source, value) in candidates {
            let Some(value) = value else {
                continue;
            };

            let ctx = GenerationContext::from_value(value);
            let report = ContextSufficiencyEvaluator::assess(stage, &ctx);
            if report.sufficient {
                info!(stage = %stage, source = source.as_str(), "Context ready");
                return Ok(ContextOutcome::Ready(ContextEnvelope {
                    source,
                    context: Some(context_json(value, &ctx)),
                    content: None,
                    html: None,
                    is_ready: true,
                    from_cache: false,
                }));
            }

            debug!(
                stage = %stage,
                source = source.as_str(),
                missing = ?report.missing,
                "Context insufficient"
            );
            last_report = Some(report);
        }

        if let Some(url) = request.website() {
            let website = self
                .fetcher
                .extract_website_content(url, false, None, &ScrapeFormat::defaults())
                .await?;

            info!(
                stage = %stage,
                url = %website.url,
                from_cache = website.from_cache,
                "Falling back to website content"
            );
            return Ok(ContextOutcome::Ready(ContextEnvelope {
                source: ContextSource::Website,
                context: None,
                content: Some(website.content),
                html: Some(website.html).filter(|html| !html.is_empty()),
                is_ready: true,
                from_cache: website.from_cache,
            }));
        }

        let report = last_report.unwrap_or_else(|| {
            ContextSufficiencyEvaluator::assess(stage, &GenerationContext::default())
        });
        info!(stage = %stage, "No usable context source");
        Ok(ContextOutcome::NotReady {
            stage,
            recommendations: report.recommendations(),
            missing: report.missing.iter().map(|m| m.to_string()).collect(),
        })
    }
}

/// Object contexts pass through as sent; lists and JSON strings are
/// replaced by their merged form
fn context_json(original: &Value, ctx: &GenerationContext) -> Value {
    match original {
        Value::Object(_) => original.clone(),
        _ => ctx.to_json(),
    }
}
