// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Website Cache
//!
//! Stores each entry as `<root>/<tier>/<sha256(canonical url)>.json`, wrapped
//! in an envelope that records when and for which URL it was written.
//!
//! **Limitations:**
//! - No cross-process locking; concurrent writers to one key race and the
//!   last writer wins
//! - TTL is checked lazily on read; expired files stay on disk until cleared
//!
//! Unreadable, corrupt or expired files are reported as misses.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{cache_key, canonicalize_url};
use crate::domain::website::{CacheError, CacheTier, ContentCache};

#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    cached_at: DateTime<Utc>,
    canonical_url: String,
    payload: Value,
}

pub struct FileContentCache {
    root: PathBuf,
    ttl: Option<Duration>,
}

impl FileContentCache {
    /// Cache rooted at `root`, with entries kept until invalidated
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: None,
        }
    }

    /// Expire entries older than `ttl_hours` on read
    pub fn with_ttl_hours(mut self, ttl_hours: u64) -> Self {
        let hours = i64::try_from(ttl_hours).unwrap_or(i64::MAX);
        self.ttl = Some(Duration::try_hours(hours).unwrap_or(Duration::MAX));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tier_dir(&self, tier: CacheTier) -> PathBuf {
        self.root.join(tier.as_str())
    }

    fn entry_path(&self, tier: CacheTier, url: &str) -> PathBuf {
        self.tier_dir(tier).join(format!("{}.json", cache_key(url)))
    }

    fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now().signed_duration_since(cached_at) > ttl,
            None => false,
        }
    }
}

fn io_error(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::Io(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl ContentCache for FileContentCache {
    async fn load(&self, tier: CacheTier, url: &str) -> Option<Value> {
        let path = self.entry_path(tier, url);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable cache entry");
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Corrupt cache entry ignored");
                return None;
            }
        };

        if self.is_expired(envelope.cached_at) {
            debug!(url = %envelope.canonical_url, tier = tier.as_str(), "Cache entry expired");
            return None;
        }

        Some(envelope.payload)
    }

    async fn save(&self, tier: CacheTier, url: &str, payload: &Value) -> Result<(), CacheError> {
        let dir = self.tier_dir(tier);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let envelope = CacheEnvelope {
            cached_at: Utc::now(),
            canonical_url: canonicalize_url(url),
            payload: payload.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let path = self.entry_path(tier, url);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn invalidate(&self, url: &str) -> Result<(), CacheError> {
        for tier in [CacheTier::Raw, CacheTier::Processed] {
            let path = self.entry_path(tier, url);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Cache entry removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        Ok(())
    }

    async fn clear(&self, tier: CacheTier) -> Result<usize, CacheError> {
        let dir = self.tier_dir(tier);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_load_preserves_payload() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileContentCache::new(dir.path());
        let payload = json!({
            "url": "https://a.test",
            "content": "# Acme\n\nWe build rockets. ünïcödé",
            "html": "<h1>Acme</h1>",
            "metadata": {"title": "Acme", "statusCode": 200},
            "crawl": false
        });

        cache.save(CacheTier::Raw, "https://A.test/", &payload).await.unwrap();

        assert_eq!(cache.load(CacheTier::Raw, "a.test").await, Some(payload));
        assert!(cache.load(CacheTier::Processed, "a.test").await.is_none());
        assert!(dir.path().join("raw").join(format!("{}.json", cache_key("a.test"))).exists());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileContentCache::new(dir.path());
        let path = cache.entry_path(CacheTier::Raw, "https://a.test");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        assert!(cache.load(CacheTier::Raw, "https://a.test").await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = FileContentCache::new(dir.path()).entry_path(CacheTier::Raw, "https://a.test");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let stale = CacheEnvelope {
            cached_at: Utc::now() - Duration::hours(5),
            canonical_url: "https://a.test".into(),
            payload: json!({"content": "old"}),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let no_ttl = FileContentCache::new(dir.path());
        assert!(no_ttl.load(CacheTier::Raw, "https://a.test").await.is_some());

        let short_ttl = FileContentCache::new(dir.path()).with_ttl_hours(1);
        assert!(short_ttl.load(CacheTier::Raw, "https://a.test").await.is_none());

        let long_ttl = FileContentCache::new(dir.path()).with_ttl_hours(24);
        assert!(long_ttl.load(CacheTier::Raw, "https://a.test").await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileContentCache::new(dir.path());

        for url in ["https://a.test", "https://b.test"] {
            cache.save(CacheTier::Raw, url, &json!({"content": url})).await.unwrap();
            cache.save(CacheTier::Processed, url, &json!({"text": url})).await.unwrap();
        }

        cache.invalidate("a.test/").await.unwrap();
        assert!(cache.load(CacheTier::Raw, "https://a.test").await.is_none());
        assert!(cache.load(CacheTier::Processed, "https://a.test").await.is_none());
        assert!(cache.load(CacheTier::Raw, "https://b.test").await.is_some());

        // Invalidating a missing entry is not an error
        cache.invalidate("https://never.test").await.unwrap();

        assert_eq!(cache.clear(CacheTier::Raw).await.unwrap(), 1);
        assert!(cache.load(CacheTier::Processed, "https://b.test").await.is_some());
        assert_eq!(cache.clear(CacheTier::Raw).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileContentCache::new(dir.path().join("nope"));
        assert_eq!(cache.clear(CacheTier::Processed).await.unwrap(), 0);
    }
}
