// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Website Content Domain - Anti-Corruption Layer for scraping and caching
//!
//! Defines the seams between the content fetcher and its collaborators:
//! - `UrlValidator`: DNS / reachability / robots checks before any fetch
//! - `ScrapingProvider`: external scraping service (single page or crawl)
//! - `ContentCache`: two-tier key-value store (raw scrape, processed text)
//!
//! Implementations live in infrastructure/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason strings surfaced to callers when validation fails
pub mod reasons {
    pub const INVALID_SCHEME: &str = "Invalid URL scheme";
    pub const INVALID_NETLOC: &str = "Invalid network location";
    pub const DNS_FAILED: &str = "DNS resolution failed";
    pub const UNREACHABLE: &str = "Website unreachable";
    /// Prefix; the status code is appended
    pub const HTTP_ERROR: &str = "HTTP error";
    pub const ROBOTS_BLOCKED: &str = "Blocked by robots.txt";
}

/// Outcome of validating a URL before scraping it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlValidation {
    /// URL as supplied by the caller
    pub url: String,

    /// URL after scheme normalisation
    pub normalized_url: String,

    /// URL after following redirects during the reachability probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    pub is_valid: bool,

    /// Machine-readable failure reason (see [`reasons`])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UrlValidation {
    pub fn valid(url: &str, normalized_url: &str, final_url: String, status: u16) -> Self {
        Self {
            url: url.to_string(),
            normalized_url: normalized_url.to_string(),
            final_url: Some(final_url),
            status_code: Some(status),
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(url: &str, normalized_url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            normalized_url: normalized_url.to_string(),
            final_url: None,
            status_code: None,
            is_valid: false,
            reason: Some(reason.into()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = Some(final_url.into());
        self
    }
}

/// Content formats requested from the scraping provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeFormat {
    Markdown,
    Html,
}

impl ScrapeFormat {
    pub fn defaults() -> Vec<ScrapeFormat> {
        vec![ScrapeFormat::Markdown, ScrapeFormat::Html]
    }
}

/// One page returned by the scraping provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Website content as returned by the fetcher and stored in the raw cache tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteContent {
    /// Canonical URL the content was fetched for
    pub url: String,

    #[serde(default)]
    pub validation: Option<UrlValidation>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub html: String,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default)]
    pub crawl: bool,

    /// Set when served from the cache rather than a live fetch
    #[serde(skip)]
    pub from_cache: bool,
}

impl WebsiteContent {
    /// An entry with neither text nor HTML is unusable
    pub fn is_usable(&self) -> bool {
        !self.content.trim().is_empty() || !self.html.trim().is_empty()
    }

    /// Markdown when present, HTML otherwise
    pub fn text(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.html
        } else {
            &self.content
        }
    }
}

/// Text derived from a raw scrape, ready for prompt injection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedContent {
    pub url: String,
    pub chunks: Vec<String>,
    pub text: String,
    /// Derived from a multi-page crawl rather than a single page
    #[serde(default)]
    pub crawl: bool,
    #[serde(skip)]
    pub from_cache: bool,
}

/// The two independent cache namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Raw,
    Processed,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Raw => "raw",
            CacheTier::Processed => "processed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Scraping request failed: {0}")]
    Network(String),

    #[error("Scraping provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Scraping provider reported failure: {0}")]
    Provider(String),

    #[error("Crawl did not finish within {0}s")]
    CrawlTimeout(u64),

    #[error("Scraping provider returned an unreadable payload: {0}")]
    Decode(String),
}

impl ScrapeError {
    /// True when the target site refused or could not be scraped, as
    /// opposed to the scraping service itself being unavailable.
    ///
    /// 401, 402 and 429 concern the service account and stay server-side.
    pub fn is_site_error(&self) -> bool {
        match self {
            ScrapeError::Http { status, .. } => {
                (400..500).contains(status) && !matches!(status, 401 | 402 | 429)
            }
            ScrapeError::Provider(_) => true,
            ScrapeError::Network(_) | ScrapeError::CrawlTimeout(_) | ScrapeError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Failures of the fetch pipeline.
///
/// Always distinguishable from a context-sufficiency outcome.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL validation failed for {}: {}", .0.url, .0.reason.as_deref().unwrap_or("unknown"))]
    Validation(UrlValidation),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

impl FetchError {
    /// Machine-readable reason for the API layer
    pub fn reason(&self) -> String {
        match self {
            FetchError::Validation(validation) => validation
                .reason
                .clone()
                .unwrap_or_else(|| "URL validation failed".to_string()),
            FetchError::Scrape(err) => format!("Scraping failed: {}", err),
        }
    }

    /// Failures caused by the requested website rather than by this service
    pub fn is_website_error(&self) -> bool {
        match self {
            FetchError::Validation(_) => true,
            FetchError::Scrape(err) => err.is_site_error(),
        }
    }
}

#[async_trait]
pub trait UrlValidator: Send + Sync {
    /// Normalise and check a URL. Never errors: failures are reported in
    /// the returned `UrlValidation`.
    async fn validate(&self, url: &str) -> UrlValidation;
}

#[async_trait]
pub trait ScrapingProvider: Send + Sync {
    async fn scrape(&self, url: &str, formats: &[ScrapeFormat]) -> Result<ScrapedPage, ScrapeError>;

    async fn crawl(
        &self,
        url: &str,
        limit: u32,
        formats: &[ScrapeFormat],
    ) -> Result<Vec<ScrapedPage>, ScrapeError>;
}

/// Key-value cache keyed by canonical URL, with independent tiers.
///
/// Corrupt or unreadable entries are reported as misses, never as errors.
#[async_trait]
pub trait ContentCache: Send + Sync {
    async fn load(&self, tier: CacheTier, url: &str) -> Option<serde_json::Value>;

    async fn save(&self, tier: CacheTier, url: &str, payload: &serde_json::Value)
        -> Result<(), CacheError>;

    /// Remove the entry for `url` from every tier
    async fn invalidate(&self, url: &str) -> Result<(), CacheError>;

    /// Remove every entry of a tier
    async fn clear(&self, tier: CacheTier) -> Result<usize, CacheError>;
}
