// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Website Cache Infrastructure
//!
//! URL canonicalisation and cache-key derivation shared by every
//! [`ContentCache`] backend, plus the backends themselves:
//!
//! - [`FileContentCache`]: JSON files on local disk, one directory per tier.
//!   Single-developer use only: no cross-process locking, last writer wins.
//! - [`MemoryContentCache`]: process-local map, for tests and ephemeral runs.

pub mod file_cache;

pub use file_cache::FileContentCache;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

use crate::domain::website::{CacheError, CacheTier, ContentCache};
use crate::infrastructure::url_validator::normalize_scheme;

/// Normalise a URL to a stable form for cache keys.
///
/// Lower-cases, defaults to `https` when no scheme is given, strips default
/// ports, a trailing slash, the query and the fragment. Idempotent.
pub fn canonicalize_url(raw: &str) -> String {
    let with_scheme = normalize_scheme(&raw.trim().to_lowercase());

    match Url::parse(&with_scheme) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            // `port()` is None when the port is the scheme default
            let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            // Percent-encoding emits upper-case hex
            format!("{}://{}{}{}", url.scheme(), host, port, path).to_lowercase()
        }
        // The scheme prefix holds no `?` or `#`, so it survives the cuts below
        Err(_) => {
            let without_fragment = with_scheme.split('#').next().unwrap_or_default();
            let without_query = without_fragment.split('?').next().unwrap_or_default();
            let trimmed = without_query.trim_end_matches('/');
            if trimmed.ends_with(':') {
                without_query.to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// SHA-256 hex digest of the canonical URL
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(canonicalize_url(url).as_bytes());
    hex::encode(digest)
}

/// In-process cache backend
#[derive(Default)]
pub struct MemoryContentCache {
    entries: Mutex<HashMap<(CacheTier, String), Value>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, tier: CacheTier) -> usize {
        self.entries.lock().keys().filter(|(t, _)| *t == tier).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ContentCache for MemoryContentCache {
    async fn load(&self, tier: CacheTier, url: &str) -> Option<Value> {
        self.entries.lock().get(&(tier, cache_key(url))).cloned()
    }

    async fn save(&self, tier: CacheTier, url: &str, payload: &Value) -> Result<(), CacheError> {
        self.entries
            .lock()
            .insert((tier, cache_key(url)), payload.clone());
        Ok(())
    }

    async fn invalidate(&self, url: &str) -> Result<(), CacheError> {
        let key = cache_key(url);
        let mut entries = self.entries.lock();
        entries.remove(&(CacheTier::Raw, key.clone()));
        entries.remove(&(CacheTier::Processed, key));
        Ok(())
    }

    async fn clear(&self, tier: CacheTier) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(t, _), _| *t != tier);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_equivalent_forms() {
        let expected = "https://example.com/path";
        assert_eq!(canonicalize_url("https://Example.com/path/"), expected);
        assert_eq!(canonicalize_url("example.com/path"), expected);
        assert_eq!(canonicalize_url("HTTPS://EXAMPLE.COM:443/path?utm=1#top"), expected);
        assert_eq!(canonicalize_url("http://example.com:80/"), "http://example.com");
        assert_eq!(canonicalize_url("https://example.com:8443/"), "https://example.com:8443");
        assert_eq!(canonicalize_url("  https://example.com/  "), "https://example.com");
        assert_eq!(
            canonicalize_url("example.com/?next=https://other.test"),
            "https://example.com"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let inputs = [
            "https://Example.com/path/",
            "example.com",
            "http://a.test:8080/x//",
            "https://a.test/a/b/?q=1",
            "https://a.test//",
            "not a url at all/",
            "ftp://files.example.org/pub/",
            "https://a.test/caf\u{e9}/",
            "example.com/?next=https://other.test",
            "",
        ];
        for input in inputs {
            let once = canonicalize_url(input);
            assert_eq!(canonicalize_url(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(cache_key("https://Example.com/path/"), cache_key("example.com/path"));
        assert_ne!(cache_key("https://a.test"), cache_key("https://b.test"));
        assert_ne!(cache_key("https://a.test/x"), cache_key("https://a.test/y"));
        assert_eq!(cache_key("https://a.test").len(), 64);
    }

    #[tokio::test]
    async fn test_memory_cache_tiers_are_independent() {
        let cache = MemoryContentCache::new();
        cache
            .save(CacheTier::Raw, "https://a.test", &json!({"content": "raw"}))
            .await
            .unwrap();

        assert_eq!(
            cache.load(CacheTier::Raw, "A.test/").await,
            Some(json!({"content": "raw"}))
        );
        assert!(cache.load(CacheTier::Processed, "https://a.test").await.is_none());

        cache
            .save(CacheTier::Processed, "https://a.test", &json!({"text": "p"}))
            .await
            .unwrap();
        assert_eq!(cache.clear(CacheTier::Raw).await.unwrap(), 1);
        assert_eq!(cache.len(CacheTier::Processed), 1);

        cache.invalidate("https://a.test").await.unwrap();
        assert!(cache.is_empty());
    }
}
