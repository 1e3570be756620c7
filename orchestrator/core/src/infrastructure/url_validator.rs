// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! URL Validator
//!
//! Pre-flight checks run before any scrape of an uncached URL:
//!
//! 1. scheme normalisation (`https` when missing, only http/https accepted)
//! 2. network location must contain a dot
//! 3. DNS resolution
//! 4. reachability probe (HEAD, GET when HEAD is refused), following redirects
//! 5. robots rules for the configured agent at `<origin>/robots.txt`
//!
//! Missing or unreachable robots files allow everything. Every failure is
//! reported through [`UrlValidation::reason`], never as an error.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::domain::website::{reasons, UrlValidation, UrlValidator};

const MAX_REDIRECTS: usize = 10;

pub struct HttpUrlValidator {
    client: reqwest::Client,
    user_agent: String,
    probe_timeout: Duration,
}

impl HttpUrlValidator {
    pub fn new(user_agent: impl Into<String>, probe_timeout_secs: u64) -> Self {
        let user_agent = user_agent.into();
        let probe_timeout = Duration::from_secs(probe_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build probe client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            user_agent,
            probe_timeout,
        }
    }

    async fn resolves(&self, url: &Url) -> bool {
        let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
            return false;
        };
        let target = format!("{}:{}", host, port);

        match tokio::time::timeout(self.probe_timeout, tokio::net::lookup_host(target)).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                debug!(host = %host, error = %e, "DNS resolution failed");
                false
            }
            Err(_) => {
                debug!(host = %host, "DNS resolution timed out");
                false
            }
        }
    }

    async fn probe(&self, url: &Url) -> Result<(u16, Url), reqwest::Error> {
        let response = self.client.head(url.as_str()).send().await?;
        if matches!(response.status().as_u16(), 405 | 501) {
            let response = self.client.get(url.as_str()).send().await?;
            return Ok((response.status().as_u16(), response.url().clone()));
        }
        Ok((response.status().as_u16(), response.url().clone()))
    }

    async fn robots_allows(&self, url: &Url) -> bool {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let body = match self.client.get(robots_url.as_str()).send().await {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                debug!(status = response.status().as_u16(), "No robots rules, allowing");
                return true;
            }
            Err(e) => {
                debug!(error = %e, "Robots rules unreachable, allowing");
                return true;
            }
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        RobotsRules::parse(&body).is_allowed(&self.user_agent, &path)
    }
}

/// True when the URL starts with `scheme://`.
///
/// Only a leading RFC 3986 scheme counts, so a URL carried in the query
/// string (`example.com/?next=https://other.test`) does not.
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Add `https://` when no scheme is present
pub fn normalize_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

#[async_trait]
impl UrlValidator for HttpUrlValidator {
    async fn validate(&self, url: &str) -> UrlValidation {
        let normalized = normalize_scheme(url);

        let scheme = normalized.split("://").next().unwrap_or_default().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return UrlValidation::invalid(url, &normalized, reasons::INVALID_SCHEME);
        }

        let parsed = match Url::parse(&normalized) {
            Ok(parsed) if parsed.host_str().is_some_and(|h| h.contains('.')) => parsed,
            _ => return UrlValidation::invalid(url, &normalized, reasons::INVALID_NETLOC),
        };

        if !self.resolves(&parsed).await {
            return UrlValidation::invalid(url, &normalized, reasons::DNS_FAILED);
        }

        let (status, final_url) = match self.probe(&parsed).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(url = %normalized, error = %e, "Reachability probe failed");
                return UrlValidation::invalid(url, &normalized, reasons::UNREACHABLE);
            }
        };

        if status >= 400 {
            return UrlValidation::invalid(
                url,
                &normalized,
                format!("{} {}", reasons::HTTP_ERROR, status),
            )
            .with_status(status)
            .with_final_url(final_url.as_str());
        }

        if !self.robots_allows(&final_url).await {
            info!(url = %normalized, agent = %self.user_agent, "URL blocked by robots rules");
            return UrlValidation::invalid(url, &normalized, reasons::ROBOTS_BLOCKED)
                .with_status(status)
                .with_final_url(final_url.as_str());
        }

        UrlValidation::valid(url, &normalized, final_url.to_string(), status)
    }
}

// ============================================================================
// Robots rules
// ============================================================================

#[derive(Debug, Clone)]
struct RobotsRule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default)]
struct RobotsGroup {
    agents: Vec<String>,
    rules: Vec<RobotsRule>,
}

/// Parsed robots exclusion file.
///
/// Groups are selected by user-agent (a specific match beats `*`). Within
/// the selected rules the longest matching pattern decides and `Allow` wins
/// ties. No matching rule means allowed.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RobotsGroup>,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<RobotsGroup> = Vec::new();
        let mut collecting_agents = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        groups.push(RobotsGroup::default());
                        collecting_agents = true;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    collecting_agents = false;
                    // An empty Disallow allows everything
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.rules.push(RobotsRule {
                            allow: key == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        Self { groups }
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        let token = user_agent
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let specific: Vec<&RobotsGroup> = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && !a.is_empty() && token.contains(a.as_str())))
            .collect();
        let selected = if specific.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            specific
        };

        let mut best: Option<(usize, bool)> = None;
        for rule in selected.iter().flat_map(|g| g.rules.iter()) {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, best_allow)) if best_len > len || (best_len == len && best_allow) => {
                    Some((best_len, best_allow))
                }
                _ => Some((len, rule.allow)),
            };
        }

        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Match a robots path pattern supporting `*` and a trailing `$`
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts.first().copied().unwrap_or_default();
    if !path.starts_with(first) {
        return false;
    }
    if parts.len() == 1 {
        return !anchored || path.len() == first.len();
    }

    let mut pos = first.len();
    let last = parts.last().copied().unwrap_or_default();
    for part in &parts[1..parts.len() - 1] {
        match path[pos..].find(part) {
            Some(offset) => pos += offset + part.len(),
            None => return false,
        }
    }

    if anchored {
        path.len() >= pos + last.len() && path.ends_with(last)
    } else {
        path[pos..].contains(last)
    }
}
