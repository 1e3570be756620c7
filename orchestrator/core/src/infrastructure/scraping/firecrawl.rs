// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Firecrawl Scraping Provider Adapter
//
// Anti-Corruption Layer for Firecrawl-compatible scraping services.
// Single pages use POST /v1/scrape. Crawls are started with POST /v1/crawl
// and polled on GET /v1/crawl/{id} until completed or the wait budget runs out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::website::{ScrapeError, ScrapeFormat, ScrapedPage, ScrapingProvider};

pub struct FirecrawlAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [ScrapeFormat],
    only_main_content: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
    scrape_options: ScrapeOptions<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeOptions<'a> {
    formats: &'a [ScrapeFormat],
    only_main_content: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<FirecrawlDocument>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStarted {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStatus {
    status: String,
    #[serde(default)]
    data: Vec<FirecrawlDocument>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FirecrawlDocument {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    metadata: Value,
}

impl From<FirecrawlDocument> for ScrapedPage {
    fn from(doc: FirecrawlDocument) -> Self {
        ScrapedPage {
            markdown: doc.markdown.unwrap_or_default(),
            html: doc.html.unwrap_or_default(),
            metadata: doc.metadata,
        }
    }
}

impl FirecrawlAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        poll_interval_ms: u64,
        max_wait_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build scraping client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_wait: Duration::from_secs(max_wait_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ScrapeError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Http {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ScrapeError::Decode(e.to_string()))
    }

    async fn wait_for_crawl(&self, id: &str) -> Result<Vec<ScrapedPage>, ScrapeError> {
        let deadline = Instant::now() + self.max_wait;
        let status_url = self.url(&format!("v1/crawl/{}", id));

        loop {
            let response = self
                .authorized(self.client.get(&status_url))
                .send()
                .await
                .map_err(|e| ScrapeError::Network(e.to_string()))?;
            let status: CrawlStatus = Self::read_json(response).await?;

            match status.status.as_str() {
                "completed" => {
                    info!(crawl_id = %id, pages = status.data.len(), "Crawl completed");
                    return Ok(status.data.into_iter().map(ScrapedPage::from).collect());
                }
                "failed" | "cancelled" => {
                    return Err(ScrapeError::Provider(
                        status
                            .error
                            .unwrap_or_else(|| format!("crawl {} {}", id, status.status)),
                    ));
                }
                other => debug!(crawl_id = %id, status = %other, "Crawl in progress"),
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(ScrapeError::CrawlTimeout(self.max_wait.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ScrapingProvider for FirecrawlAdapter {
    async fn scrape(&self, url: &str, formats: &[ScrapeFormat]) -> Result<ScrapedPage, ScrapeError> {
        let body = ScrapeRequest {
            url,
            formats,
            only_main_content: true,
        };

        let response = self
            .authorized(self.client.post(self.url("v1/scrape")))
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        let scraped: ScrapeResponse = Self::read_json(response).await?;

        if !scraped.success {
            return Err(ScrapeError::Provider(
                scraped.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        scraped
            .data
            .map(ScrapedPage::from)
            .ok_or_else(|| ScrapeError::Decode("missing data in scrape response".to_string()))
    }

    async fn crawl(
        &self,
        url: &str,
        limit: u32,
        formats: &[ScrapeFormat],
    ) -> Result<Vec<ScrapedPage>, ScrapeError> {
        let body = CrawlRequest {
            url,
            limit,
            scrape_options: ScrapeOptions {
                formats,
                only_main_content: true,
            },
        };

        let response = self
            .authorized(self.client.post(self.url("v1/crawl")))
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        let started: CrawlStarted = Self::read_json(response).await?;

        let id = match (started.success, started.id) {
            (true, Some(id)) => id,
            (_, _) => {
                return Err(ScrapeError::Provider(
                    started.error.unwrap_or_else(|| "crawl not started".to_string()),
                ))
            }
        };

        info!(url = %url, crawl_id = %id, limit, "Crawl started");
        self.wait_for_crawl(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn adapter(endpoint: String) -> FirecrawlAdapter {
        FirecrawlAdapter::new(endpoint, Some("fc-test".into()), 5, 10, 1)
    }

    #[tokio::test]
    async fn test_scrape_single_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/scrape")
            .match_header("authorization", "Bearer fc-test")
            .match_body(Matcher::PartialJson(json!({
                "url": "https://acme.test",
                "formats": ["markdown", "html"]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "markdown": "# Acme",
                        "html": "<h1>Acme</h1>",
                        "metadata": {"title": "Acme", "statusCode": 200}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = adapter(server.url())
            .scrape("https://acme.test", &ScrapeFormat::defaults())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.markdown, "# Acme");
        assert_eq!(page.html, "<h1>Acme</h1>");
        assert_eq!(page.metadata["title"], "Acme");
    }

    #[tokio::test]
    async fn test_scrape_reports_provider_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scrape")
            .with_status(200)
            .with_body(r#"{"success": false, "error": "blocked"}"#)
            .create_async()
            .await;

        let err = adapter(server.url())
            .scrape("https://acme.test", &[ScrapeFormat::Markdown])
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Provider(message) if message == "blocked"));
    }

    #[tokio::test]
    async fn test_scrape_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scrape")
            .with_status(402)
            .with_body("payment required")
            .create_async()
            .await;

        let err = adapter(server.url())
            .scrape("https://acme.test", &[ScrapeFormat::Markdown])
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Http { status: 402, .. }));
    }

    #[tokio::test]
    async fn test_crawl_polls_until_completed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/crawl")
            .match_body(Matcher::PartialJson(json!({"limit": 3})))
            .with_status(200)
            .with_body(r#"{"success": true, "id": "job-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-1")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "data": [
                        {"markdown": "page one", "html": "<p>1</p>", "metadata": {}},
                        {"markdown": "page two", "metadata": {}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let pages = adapter(server.url())
            .crawl("https://acme.test", 3, &ScrapeFormat::defaults())
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].markdown, "page two");
        assert!(pages[1].html.is_empty());
    }

    #[tokio::test]
    async fn test_crawl_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/crawl")
            .with_status(200)
            .with_body(r#"{"success": true, "id": "slow"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/slow")
            .with_status(200)
            .with_body(r#"{"status": "scraping", "data": []}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let adapter = FirecrawlAdapter::new(server.url(), None, 5, 200, 0);
        let err = adapter
            .crawl("https://acme.test", 2, &[ScrapeFormat::Markdown])
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::CrawlTimeout(0)));
    }
}
