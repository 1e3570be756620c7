// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composition root
//!
//! Builds the process-wide services once from the engine configuration and
//! hands out `Arc` handles. Nothing in the core holds global state.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use gtm_core::application::{AnalysisService, ContextResolver};
use gtm_core::domain::engine_config::EngineConfigManifest;
use gtm_core::domain::website::ContentCache;
use gtm_core::infrastructure::cache::FileContentCache;
use gtm_core::infrastructure::llm::LLMClient;
use gtm_core::infrastructure::preprocessing::ContentPreprocessor;
use gtm_core::infrastructure::scraping::FirecrawlAdapter;
use gtm_core::infrastructure::url_validator::HttpUrlValidator;
use gtm_core::infrastructure::{ContentFetcher, PromptTemplateEngine};

pub struct Engine {
    pub config: EngineConfigManifest,
    pub llm: Arc<LLMClient>,
    pub fetcher: Arc<ContentFetcher>,
    pub resolver: Arc<ContextResolver>,
    pub analysis: Arc<AnalysisService>,
    pub cache: Option<Arc<FileContentCache>>,
}

impl Engine {
    pub fn build(config: EngineConfigManifest) -> Result<Self> {
        let spec = &config.spec;
        info!(
            environment = spec.environment.as_str(),
            providers = spec.llm_providers.len(),
            "Building GTM engine"
        );

        let llm = Arc::new(
            LLMClient::from_config(&spec.llm_providers, spec.circuit_breaker.clone())
                .context("Failed to initialize LLM client")?,
        );
        let cache = build_cache(&config);
        let fetcher = Arc::new(build_fetcher(&config, cache.clone()));
        let resolver = Arc::new(ContextResolver::new(fetcher.clone()));
        let analysis = Arc::new(AnalysisService::new(
            llm.clone(),
            fetcher.clone(),
            resolver.clone(),
            Arc::new(PromptTemplateEngine::new()),
        ));

        Ok(Self {
            config,
            llm,
            fetcher,
            resolver,
            analysis,
            cache,
        })
    }

    /// Website services only, for commands that never call an LLM
    pub fn website_only(config: &EngineConfigManifest) -> Arc<ContentFetcher> {
        Arc::new(build_fetcher(config, build_cache(config)))
    }
}

fn build_cache(config: &EngineConfigManifest) -> Option<Arc<FileContentCache>> {
    let spec = &config.spec;
    if !spec.environment.caching_enabled() {
        info!("Website caching disabled in {}", spec.environment.as_str());
        return None;
    }

    let mut cache = FileContentCache::new(&spec.cache.directory);
    if spec.environment.enforces_cache_ttl() {
        cache = cache.with_ttl_hours(spec.cache.ttl_hours);
    }
    info!(directory = %spec.cache.directory.display(), "Website cache enabled");
    Some(Arc::new(cache))
}

fn build_fetcher(
    config: &EngineConfigManifest,
    cache: Option<Arc<FileContentCache>>,
) -> ContentFetcher {
    let scraping = &config.spec.scraping;

    // A missing scraping key only matters once a page is actually fetched
    let api_key = scraping.resolved_api_key().unwrap_or_else(|e| {
        warn!("Scraping API key unavailable: {}", e);
        None
    });

    let validator = Arc::new(HttpUrlValidator::new(
        &scraping.user_agent,
        scraping.probe_timeout_secs,
    ));
    let scraper = Arc::new(FirecrawlAdapter::new(
        scraping.endpoint.clone(),
        api_key,
        scraping.timeout_secs,
        scraping.crawl_poll_interval_ms,
        scraping.crawl_max_wait_secs,
    ));

    ContentFetcher::new(
        validator,
        scraper,
        cache.map(|c| c as Arc<dyn ContentCache>),
        ContentPreprocessor::new(&config.spec.content),
        scraping.crawl_limit,
    )
}
