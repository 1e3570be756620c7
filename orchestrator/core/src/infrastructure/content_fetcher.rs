// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Content Fetcher
//!
//! Cache-then-fetch access to website content, in two tiers:
//!
//! - **raw**: the scrape result (`url, validation, content, html, metadata, crawl`)
//! - **processed**: chunked and filtered text ready for prompt injection,
//!   consulted before the raw tier when only text is needed
//!
//! Uncached URLs must pass [`UrlValidator`] before the scraping provider is
//! called. The cache is optional; the composition root leaves it out in
//! production.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::website::{
    CacheError, CacheTier, ContentCache, FetchError, ProcessedContent, ScrapeFormat,
    ScrapingProvider, UrlValidation, UrlValidator, WebsiteContent,
};
use crate::infrastructure::cache::canonicalize_url;
use crate::infrastructure::preprocessing::ContentPreprocessor;

pub struct ContentFetcher {
    validator: Arc<dyn UrlValidator>,
    scraper: Arc<dyn ScrapingProvider>,
    cache: Option<Arc<dyn ContentCache>>,
    preprocessor: ContentPreprocessor,
    default_crawl_limit: u32,
}

impl ContentFetcher {
    pub fn new(
        validator: Arc<dyn UrlValidator>,
        scraper: Arc<dyn ScrapingProvider>,
        cache: Option<Arc<dyn ContentCache>>,
        preprocessor: ContentPreprocessor,
        default_crawl_limit: u32,
    ) -> Self {
        Self {
            validator,
            scraper,
            cache,
            preprocessor,
            default_crawl_limit: default_crawl_limit.max(1),
        }
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub async fn validate_url(&self, url: &str) -> UrlValidation {
        self.validator.validate(url).await
    }

    /// Return website content, from the raw cache tier when possible.
    ///
    /// Crawl mode fetches up to `crawl_limit` pages (configured default when
    /// `None`) and joins them with blank lines.
    pub async fn extract_website_content(
        &self,
        url: &str,
        crawl: bool,
        crawl_limit: Option<u32>,
        formats: &[ScrapeFormat],
    ) -> Result<WebsiteContent, FetchError> {
        let canonical = canonicalize_url(url);

        if let Some(cached) = self.cached_raw(&canonical, crawl).await {
            return Ok(cached);
        }

        let validation = self.validator.validate(url).await;
        if !validation.is_valid {
            warn!(
                url = %url,
                reason = validation.reason.as_deref().unwrap_or("unknown"),
                "URL validation failed"
            );
            return Err(FetchError::Validation(validation));
        }

        let target = validation.normalized_url.clone();
        let (content, html, metadata) = if crawl {
            let limit = crawl_limit.unwrap_or(self.default_crawl_limit).max(1);
            let pages = self.scraper.crawl(&target, limit, formats).await?;
            let content = join_non_empty(pages.iter().map(|p| p.markdown.as_str()));
            let html = join_non_empty(pages.iter().map(|p| p.html.as_str()));
            let sources: Vec<Value> = pages.into_iter().map(|p| p.metadata).collect();
            (content, html, json!({ "pages": sources.len(), "sources": sources }))
        } else {
            let page = self.scraper.scrape(&target, formats).await?;
            (page.markdown, page.html, page.metadata)
        };

        let website = WebsiteContent {
            url: canonical.clone(),
            validation: Some(validation),
            content,
            html,
            metadata,
            crawl,
            from_cache: false,
        };

        info!(
            url = %canonical,
            crawl,
            content_chars = website.content.len(),
            "Website content fetched"
        );

        if website.is_usable() {
            self.store(CacheTier::Raw, &canonical, &website).await;
        }
        Ok(website)
    }

    /// Return prompt-ready text, consulting the processed tier first.
    pub async fn get_processed_content(
        &self,
        url: &str,
        crawl: bool,
    ) -> Result<ProcessedContent, FetchError> {
        let canonical = canonicalize_url(url);
        if let Some(processed) = self.cached_processed(&canonical, crawl).await {
            return Ok(processed);
        }

        let raw = self
            .extract_website_content(url, crawl, None, &ScrapeFormat::defaults())
            .await?;
        let mut processed = self.preprocess(&canonical, raw.text(), crawl).await;
        processed.from_cache = raw.from_cache;
        Ok(processed)
    }

    /// Prompt-ready text for single-page content that has already been fetched
    pub async fn prepare_text(&self, url: &str, text: &str) -> ProcessedContent {
        let canonical = canonicalize_url(url);
        if let Some(processed) = self.cached_processed(&canonical, false).await {
            return processed;
        }
        self.preprocess(&canonical, text, false).await
    }

    async fn preprocess(&self, canonical: &str, text: &str, crawl: bool) -> ProcessedContent {
        let mut processed = self.preprocessor.process(canonical, text).await;
        processed.crawl = crawl;
        if !processed.text.trim().is_empty() {
            self.store(CacheTier::Processed, canonical, &processed).await;
        }
        processed
    }

    async fn cached_processed(&self, canonical: &str, crawl: bool) -> Option<ProcessedContent> {
        let cache = self.cache.as_ref()?;

        let hit = cache
            .load(CacheTier::Processed, canonical)
            .await
            .and_then(|value| serde_json::from_value::<ProcessedContent>(value).ok())
            .filter(|processed| !processed.text.trim().is_empty() && processed.crawl == crawl);

        record_lookup(CacheTier::Processed, hit.is_some());
        hit.map(|mut processed| {
            debug!(url = %canonical, "Processed content cache hit");
            processed.from_cache = true;
            processed
        })
    }

    /// Drop a URL from both tiers
    pub async fn invalidate(&self, url: &str) -> Result<(), CacheError> {
        match &self.cache {
            Some(cache) => cache.invalidate(&canonicalize_url(url)).await,
            None => Ok(()),
        }
    }

    /// Drop every entry of a tier
    pub async fn clear(&self, tier: CacheTier) -> Result<usize, CacheError> {
        match &self.cache {
            Some(cache) => cache.clear(tier).await,
            None => Ok(0),
        }
    }

    /// Entries fetched in the other mode (crawl vs single page) are misses;
    /// the fresh fetch replaces them.
    async fn cached_raw(&self, canonical: &str, crawl: bool) -> Option<WebsiteContent> {
        let cache = self.cache.as_ref()?;

        let hit = match cache.load(CacheTier::Raw, canonical).await {
            Some(value) => match serde_json::from_value::<WebsiteContent>(value) {
                Ok(content) if content.crawl != crawl => {
                    debug!(url = %canonical, crawl, "Cache entry fetched in the other mode");
                    None
                }
                Ok(content) if content.is_usable() => Some(content),
                Ok(_) => {
                    debug!(url = %canonical, "Discarding empty cache entry");
                    None
                }
                Err(e) => {
                    debug!(url = %canonical, error = %e, "Discarding malformed cache entry");
                    None
                }
            },
            None => None,
        };

        record_lookup(CacheTier::Raw, hit.is_some());
        hit.map(|mut content| {
            debug!(url = %canonical, "Website cache hit");
            content.from_cache = true;
            content
        })
    }

    async fn store<T: serde::Serialize>(&self, tier: CacheTier, canonical: &str, item: &T) {
        let Some(cache) = &self.cache else {
            return;
        };

        let payload = match serde_json::to_value(item) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(url = %canonical, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        // A failed write only costs a future re-fetch
        if let Err(e) = cache.save(tier, canonical, &payload).await {
            warn!(url = %canonical, tier = tier.as_str(), error = %e, "Failed to write cache entry");
        }
    }
}

fn record_lookup(tier: CacheTier, hit: bool) {
    let name = if hit {
        "gtm_website_cache_hits_total"
    } else {
        "gtm_website_cache_misses_total"
    };
    metrics::counter!(name, "tier" => tier.as_str()).increment(1);
}

fn join_non_empty<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine_config::ContentConfig;
    use crate::domain::website::{reasons, ScrapeError, ScrapedPage};
    use crate::infrastructure::cache::MemoryContentCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticValidator {
        blocked: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UrlValidator for StaticValidator {
        async fn validate(&self, url: &str) -> UrlValidation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let normalized = crate::infrastructure::url_validator::normalize_scheme(url);
            if self.blocked {
                UrlValidation::invalid(url, &normalized, reasons::ROBOTS_BLOCKED)
            } else {
                UrlValidation::valid(url, &normalized, normalized.clone(), 200)
            }
        }
    }

    #[derive(Default)]
    struct CountingScraper {
        scrapes: AtomicUsize,
        crawls: AtomicUsize,
    }

    #[async_trait]
    impl ScrapingProvider for CountingScraper {
        async fn scrape(&self, url: &str, _formats: &[ScrapeFormat]) -> Result<ScrapedPage, ScrapeError> {
            self.scrapes.fetch_add(1, Ordering::SeqCst);
            Ok(ScrapedPage {
                markdown: format!("# Acme\n\nAcme builds rockets. Source: {}", url),
                html: "<h1>Acme</h1>".to_string(),
                metadata: json!({"title": "Acme"}),
            })
        }

        async fn crawl(
            &self,
            _url: &str,
            limit: u32,
            _formats: &[ScrapeFormat],
        ) -> Result<Vec<ScrapedPage>, ScrapeError> {
            self.crawls.fetch_add(1, Ordering::SeqCst);
            Ok((1..=limit)
                .map(|i| ScrapedPage {
                    markdown: format!("page {}", i),
                    html: String::new(),
                    metadata: json!({"page": i}),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingCache {
        inner: MemoryContentCache,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl ContentCache for CountingCache {
        async fn load(&self, tier: CacheTier, url: &str) -> Option<Value> {
            self.inner.load(tier, url).await
        }

        async fn save(&self, tier: CacheTier, url: &str, payload: &Value) -> Result<(), CacheError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.save(tier, url, payload).await
        }

        async fn invalidate(&self, url: &str) -> Result<(), CacheError> {
            self.inner.invalidate(url).await
        }

        async fn clear(&self, tier: CacheTier) -> Result<usize, CacheError> {
            self.inner.clear(tier).await
        }
    }

    struct Harness {
        validator: Arc<StaticValidator>,
        scraper: Arc<CountingScraper>,
        cache: Arc<CountingCache>,
    }

    impl Harness {
        fn new(blocked: bool) -> Self {
            Self {
                validator: Arc::new(StaticValidator {
                    blocked,
                    calls: AtomicUsize::new(0),
                }),
                scraper: Arc::new(CountingScraper::default()),
                cache: Arc::new(CountingCache::default()),
            }
        }

        fn fetcher(&self, cached: bool) -> ContentFetcher {
            let cache: Option<Arc<dyn ContentCache>> = if cached {
                Some(self.cache.clone() as Arc<dyn ContentCache>)
            } else {
                None
            };
            ContentFetcher::new(
                self.validator.clone(),
                self.scraper.clone(),
                cache,
                ContentPreprocessor::new(&ContentConfig::default()),
                5,
            )
        }
    }

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(true);
        let formats = ScrapeFormat::defaults();

        let first = fetcher
            .extract_website_content("https://a.test", false, None, &formats)
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.cache.writes.load(Ordering::SeqCst), 1);

        let second = fetcher
            .extract_website_content("https://A.test/", false, None, &formats)
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.validator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.content, first.content);
        assert_eq!(second.html, first.html);
        assert_eq!(second.url, "https://a.test");
        assert!(second.validation.is_some());
    }

    #[tokio::test]
    async fn test_robots_block_prevents_scrape() {
        let harness = Harness::new(true);
        let fetcher = harness.fetcher(true);

        let err = fetcher
            .extract_website_content("https://a.test", false, None, &ScrapeFormat::defaults())
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "Blocked by robots.txt");
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 0);
        assert_eq!(harness.cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_cache_entry_forces_refetch() {
        let harness = Harness::new(false);
        harness
            .cache
            .inner
            .save(
                CacheTier::Raw,
                "https://a.test",
                &json!({"url": "https://a.test", "content": "", "html": "", "metadata": {}, "crawl": false}),
            )
            .await
            .unwrap();

        let content = harness
            .fetcher(true)
            .extract_website_content("a.test", false, None, &ScrapeFormat::defaults())
            .await
            .unwrap();

        assert!(!content.from_cache);
        assert!(content.is_usable());
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncached_fetcher_always_scrapes() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(false);
        assert!(!fetcher.caching_enabled());

        for _ in 0..2 {
            fetcher
                .extract_website_content("https://a.test", false, None, &ScrapeFormat::defaults())
                .await
                .unwrap();
        }
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 2);
        assert_eq!(harness.cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_crawl_joins_pages() {
        let harness = Harness::new(false);
        let content = harness
            .fetcher(true)
            .extract_website_content("https://a.test", true, Some(3), &ScrapeFormat::defaults())
            .await
            .unwrap();

        assert!(content.crawl);
        assert_eq!(content.content, "page 1\n\npage 2\n\npage 3");
        assert_eq!(content.metadata["pages"], 3);
        assert_eq!(harness.scraper.crawls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_crawl_and_single_page_entries_do_not_mix() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(true);
        let formats = ScrapeFormat::defaults();

        let single = fetcher
            .extract_website_content("https://a.test", false, None, &formats)
            .await
            .unwrap();
        assert!(!single.crawl);

        let crawled = fetcher
            .extract_website_content("https://a.test", true, Some(2), &formats)
            .await
            .unwrap();
        assert!(crawled.crawl);
        assert!(!crawled.from_cache);
        assert_eq!(harness.scraper.crawls.load(Ordering::SeqCst), 1);

        // The crawl replaced the single-page entry
        let again = fetcher
            .extract_website_content("https://a.test", true, Some(2), &formats)
            .await
            .unwrap();
        assert!(again.from_cache);
        assert_eq!(again.content, "page 1\n\npage 2");

        let processed = fetcher.get_processed_content("https://a.test", false).await.unwrap();
        assert!(!processed.crawl);
        assert!(processed.text.contains("Acme builds rockets"));
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_processed_tier_is_consulted_first() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(true);

        let first = fetcher.get_processed_content("https://a.test", false).await.unwrap();
        assert!(first.text.contains("Acme builds rockets"));
        assert!(!first.from_cache);
        // raw + processed
        assert_eq!(harness.cache.writes.load(Ordering::SeqCst), 2);

        let second = fetcher.get_processed_content("https://a.test", false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.text, first.text);
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.cache.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prepare_text_reuses_fetched_content() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(true);

        let raw = fetcher
            .extract_website_content("https://a.test", false, None, &ScrapeFormat::defaults())
            .await
            .unwrap();
        let processed = fetcher.prepare_text(&raw.url, raw.text()).await;

        assert!(processed.text.contains("Acme builds rockets"));
        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 1);
        assert!(fetcher.prepare_text("https://a.test/", "ignored").await.from_cache);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let harness = Harness::new(false);
        let fetcher = harness.fetcher(true);
        let formats = ScrapeFormat::defaults();

        fetcher
            .extract_website_content("https://a.test", false, None, &formats)
            .await
            .unwrap();
        fetcher.invalidate("https://a.test/").await.unwrap();
        fetcher
            .extract_website_content("https://a.test", false, None, &formats)
            .await
            .unwrap();

        assert_eq!(harness.scraper.scrapes.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.clear(CacheTier::Raw).await.unwrap(), 1);
    }
}
