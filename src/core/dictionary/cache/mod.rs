//! Lookup Cache Service
//!
//! Caches non-primary lookup results per `(word, language)` with hit counting.
//!
//! # Policy
//!
//! - Keys are `{prefix}{language}:{word}` with both parts lower-cased.
//! - Results from the primary local dictionary are never written.
//! - A read hit bumps `hit_count` and rewrites the entry with its *remaining*
//!   TTL, so reads never extend an entry's life.
//! - Default TTL comes from a control key in the backend when it holds a
//!   positive integer, otherwise from configuration.
//! - Any backend failure degrades to a miss (reads) or a no-op (writes).

mod backend;
mod redis_backend;

pub use backend::{CacheBackend, KeyTtl, MemoryCacheBackend, DEFAULT_MEMORY_CAPACITY};
pub use redis_backend::RedisCacheBackend;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{DictionaryError, Result};
use super::types::{CacheEntry, DictSource, DictionaryResponse};

pub const DEFAULT_KEY_PREFIX: &str = "dict:";
pub const DEFAULT_TTL_DAYS: u64 = 30;
pub const DEFAULT_TTL_CONTROL_KEY: &str = "dict:config:ttl_days";

const SECS_PER_DAY: u64 = 86_400;

/// Key layout and TTL policy.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key_prefix: String,
    pub default_ttl_days: u64,
    pub ttl_control_key: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl_days: DEFAULT_TTL_DAYS,
            ttl_control_key: DEFAULT_TTL_CONTROL_KEY.to_string(),
        }
    }
}

/// Hit bookkeeping returned alongside cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHitStats {
    pub hit: bool,
    pub hit_count: u64,
    pub age_days: i64,
}

#[derive(Debug, Clone)]
pub struct CachedLookup {
    pub data: DictionaryResponse,
    pub stats: CacheHitStats,
}

/// Read-only view of an entry for debugging.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub key: String,
    pub source: DictSource,
    pub hit_count: u64,
    pub created_at: i64,
    pub last_hit_at: i64,
    pub age_days: i64,
    /// Remaining lifetime in seconds; `None` when the entry never expires.
    pub ttl_secs: Option<u64>,
}

pub struct CacheService {
    backend: Option<Arc<dyn CacheBackend>>,
    settings: CacheSettings,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, settings: CacheSettings) -> Self {
        Self {
            backend: Some(backend),
            settings,
        }
    }

    /// A service that misses every read and ignores every write.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            settings: CacheSettings::default(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub fn is_ready(&self) -> bool {
        self.ready_backend().is_some()
    }

    fn ready_backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.backend.as_ref().filter(|b| b.is_ready())
    }

    pub fn make_cache_key(&self, word: &str, language: &str) -> String {
        format!(
            "{}{}:{}",
            self.settings.key_prefix,
            language.trim().to_lowercase(),
            word.trim().to_lowercase()
        )
    }

    /// Read an entry, counting the hit.
    pub async fn get_cached(&self, word: &str, language: &str) -> Option<CachedLookup> {
        let backend = self.ready_backend()?;
        let key = self.make_cache_key(word, language);

        let mut entry = self.read_entry(backend, &key).await?;
        let now = now_ms();
        entry.hit_count += 1;
        entry.last_hit_at = now;

        self.write_back(backend, &key, &entry).await;

        tracing::debug!(key = %key, hit_count = entry.hit_count, "Cache hit");
        Some(CachedLookup {
            stats: CacheHitStats {
                hit: true,
                hit_count: entry.hit_count,
                age_days: entry.age_days(now),
            },
            data: entry.data,
        })
    }

    /// Write a fresh entry. Returns false when skipped or when the write failed.
    pub async fn set_cached(
        &self,
        word: &str,
        language: &str,
        data: &DictionaryResponse,
        source: DictSource,
    ) -> bool {
        if !source.is_cacheable() {
            tracing::trace!(word = %word, source = %source, "Source exempt from caching");
            return false;
        }
        let Some(backend) = self.ready_backend() else {
            return false;
        };

        let key = self.make_cache_key(word, language);
        let mut payload = data.clone();
        payload.cached = false;
        let entry = CacheEntry::new(payload, now_ms());

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        let ttl_days = self.effective_ttl_days_with(backend).await;
        match backend
            .set(&key, &json, Some(Duration::from_secs(ttl_days * SECS_PER_DAY)))
            .await
        {
            Ok(()) => {
                tracing::debug!(key = %key, ttl_days, source = %source, "Cached lookup result");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    pub async fn delete_cached(&self, word: &str, language: &str) -> bool {
        let Some(backend) = self.ready_backend() else {
            return false;
        };
        let key = self.make_cache_key(word, language);
        match backend.delete(&key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    /// Inspect an entry without counting a hit.
    pub async fn get_cache_info(&self, word: &str, language: &str) -> Option<CacheInfo> {
        let backend = self.ready_backend()?;
        let key = self.make_cache_key(word, language);
        let entry = self.read_entry(backend, &key).await?;

        let ttl_secs = match backend.ttl(&key).await {
            Ok(KeyTtl::Expires(remaining)) => Some(remaining.as_secs()),
            _ => None,
        };

        Some(CacheInfo {
            source: entry.data.source,
            hit_count: entry.hit_count,
            created_at: entry.created_at,
            last_hit_at: entry.last_hit_at,
            age_days: entry.age_days(now_ms()),
            ttl_secs,
            key,
        })
    }

    /// TTL in days applied to new entries.
    pub async fn effective_ttl_days(&self) -> u64 {
        match self.ready_backend() {
            Some(backend) => self.effective_ttl_days_with(backend).await,
            None => self.settings.default_ttl_days,
        }
    }

    /// Persist a runtime TTL override in the backend's control key.
    pub async fn set_ttl_days(&self, days: u64) -> Result<()> {
        if days == 0 {
            return Err(DictionaryError::config("cache TTL must be at least one day"));
        }
        let backend = self
            .ready_backend()
            .ok_or_else(|| DictionaryError::cache("cache backend not available"))?;
        backend
            .set(&self.settings.ttl_control_key, &days.to_string(), None)
            .await?;
        tracing::info!(days, "Cache TTL override updated");
        Ok(())
    }

    async fn effective_ttl_days_with(&self, backend: &Arc<dyn CacheBackend>) -> u64 {
        match backend.get(&self.settings.ttl_control_key).await {
            Ok(Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    tracing::debug!(value = %raw, "Ignoring invalid cache TTL override");
                    self.settings.default_ttl_days
                }
            },
            Ok(None) => self.settings.default_ttl_days,
            Err(e) => {
                tracing::debug!(error = %e, "Could not read cache TTL override");
                self.settings.default_ttl_days
            }
        }
    }

    async fn read_entry(
        &self,
        backend: &Arc<dyn CacheBackend>,
        key: &str,
    ) -> Option<CacheEntry<DictionaryResponse>> {
        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                let _ = backend.delete(key).await;
                None
            }
        }
    }

    /// Rewrite an entry keeping its current expiry.
    async fn write_back(
        &self,
        backend: &Arc<dyn CacheBackend>,
        key: &str,
        entry: &CacheEntry<DictionaryResponse>,
    ) {
        let ttl = match backend.ttl(key).await {
            Ok(KeyTtl::Expires(remaining)) if !remaining.is_zero() => Some(remaining),
            Ok(KeyTtl::Persistent) => None,
            // Expired between read and write.
            Ok(_) => return,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Could not read TTL for hit update");
                return;
            }
        };

        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => return,
        };
        if let Err(e) = backend.set(key, &json, ttl).await {
            tracing::debug!(key = %key, error = %e, "Could not persist hit count");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dictionary::test_support::entry_with_definitions;
    use async_trait::async_trait;
    use proptest::prelude::*;

    fn service() -> (CacheService, Arc<MemoryCacheBackend>) {
        let backend = Arc::new(MemoryCacheBackend::new(64));
        (
            CacheService::new(backend.clone(), CacheSettings::default()),
            backend,
        )
    }

    fn sample() -> DictionaryResponse {
        let mut resp = entry_with_definitions("serendipity", &[("noun", "a happy accident")]);
        resp.source = DictSource::Wiktionary;
        resp
    }

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn is_ready(&self) -> bool {
            true
        }
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(DictionaryError::cache("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<()> {
            Err(DictionaryError::cache("connection refused"))
        }
        async fn ttl(&self, _key: &str) -> Result<KeyTtl> {
            Err(DictionaryError::cache("connection refused"))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(DictionaryError::cache("connection refused"))
        }
    }

    #[test]
    fn test_cache_key_is_case_insensitive_and_namespaced() {
        let (cache, _) = service();
        assert_eq!(cache.make_cache_key("Hello", "en"), "dict:en:hello");
        assert_eq!(
            cache.make_cache_key("HELLO", "EN"),
            cache.make_cache_key("hello", "en")
        );
        assert_ne!(
            cache.make_cache_key("hello", "en"),
            cache.make_cache_key("hello", "de")
        );
    }

    proptest! {
        #[test]
        fn prop_cache_key_ignores_word_case(word in "[a-zA-Z]{1,16}", lang in "[a-z]{2}") {
            let cache = CacheService::disabled();
            prop_assert_eq!(
                cache.make_cache_key(&word.to_uppercase(), &lang),
                cache.make_cache_key(&word.to_lowercase(), &lang)
            );
        }
    }

    #[tokio::test]
    async fn test_set_then_get_counts_hits() {
        let (cache, _) = service();
        assert!(cache.set_cached("Serendipity", "en", &sample(), DictSource::Wiktionary).await);

        let first = cache.get_cached("serendipity", "en").await.unwrap();
        assert_eq!(first.stats.hit_count, 1);
        assert!(first.stats.hit);
        assert_eq!(first.stats.age_days, 0);
        assert_eq!(first.data.definitions, sample().definitions);
        assert!(!first.data.cached);

        let second = cache.get_cached("SERENDIPITY", "en").await.unwrap();
        assert_eq!(second.stats.hit_count, 2);
    }

    #[tokio::test]
    async fn test_primary_source_is_never_cached() {
        let (cache, backend) = service();
        assert!(!cache.set_cached("hello", "en", &sample(), DictSource::Ecdict).await);
        assert!(backend.is_empty().await);
        assert!(cache.get_cached("hello", "en").await.is_none());
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let (cache, _) = service();
        assert!(cache.get_cached("nothing", "en").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_preserves_remaining_ttl() {
        let (cache, backend) = service();
        cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await;
        let key = cache.make_cache_key("word", "en");
        let full = Duration::from_secs(DEFAULT_TTL_DAYS * SECS_PER_DAY);

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache.get_cached("word", "en").await.unwrap();

        assert_eq!(
            backend.ttl(&key).await.unwrap(),
            KeyTtl::Expires(full - Duration::from_secs(3600))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_on_original_schedule() {
        let (cache, _) = service();
        cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await;
        let full = Duration::from_secs(DEFAULT_TTL_DAYS * SECS_PER_DAY);

        for _ in 0..3 {
            tokio::time::advance(full / 4).await;
            assert!(cache.get_cached("word", "en").await.is_some());
        }
        tokio::time::advance(full / 4 + Duration::from_secs(1)).await;
        assert!(cache.get_cached("word", "en").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_control_key_overrides_default() {
        let (cache, backend) = service();
        assert_eq!(cache.effective_ttl_days().await, DEFAULT_TTL_DAYS);

        cache.set_ttl_days(7).await.unwrap();
        assert_eq!(cache.effective_ttl_days().await, 7);

        cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await;
        let info = cache.get_cache_info("word", "en").await.unwrap();
        assert_eq!(info.ttl_secs, Some(7 * SECS_PER_DAY));

        backend
            .set(DEFAULT_TTL_CONTROL_KEY, "not-a-number", None)
            .await
            .unwrap();
        assert_eq!(cache.effective_ttl_days().await, DEFAULT_TTL_DAYS);

        assert!(cache.set_ttl_days(0).await.is_err());
    }

    #[tokio::test]
    async fn test_cache_info_does_not_count_hits() {
        let (cache, _) = service();
        cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await;
        cache.get_cached("word", "en").await;

        let info = cache.get_cache_info("word", "en").await.unwrap();
        let again = cache.get_cache_info("word", "en").await.unwrap();
        assert_eq!(info.hit_count, 1);
        assert_eq!(again.hit_count, 1);
        assert_eq!(info.source, DictSource::Wiktionary);
        assert_eq!(info.key, "dict:en:word");
    }

    #[tokio::test]
    async fn test_delete_cached() {
        let (cache, _) = service();
        cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await;
        assert!(cache.delete_cached("WORD", "en").await);
        assert!(cache.get_cached("word", "en").await.is_none());
        assert!(!cache.delete_cached("word", "en").await);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let (cache, backend) = service();
        let key = cache.make_cache_key("word", "en");
        backend.set(&key, "{not json", None).await.unwrap();

        assert!(cache.get_cached("word", "en").await.is_none());
        assert_eq!(backend.ttl(&key).await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_not_ready_backend_is_bypassed() {
        let (cache, backend) = service();
        backend.set_ready(false);
        assert!(!cache.is_ready());
        assert!(!cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await);
        assert!(cache.get_cached("word", "en").await.is_none());

        backend.set_ready(true);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_backend_errors_degrade_to_miss() {
        let cache = CacheService::new(Arc::new(BrokenBackend), CacheSettings::default());
        assert!(cache.get_cached("word", "en").await.is_none());
        assert!(!cache.set_cached("word", "en", &sample(), DictSource::Wiktionary).await);
        assert!(!cache.delete_cached("word", "en").await);
        assert_eq!(cache.effective_ttl_days().await, DEFAULT_TTL_DAYS);
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let cache = CacheService::disabled();
        assert!(!cache.is_ready());
        assert!(cache.backend_name().is_none());
        assert!(!cache.set_cached("w", "en", &sample(), DictSource::Wiktionary).await);
        assert!(cache.set_ttl_days(3).await.is_err());
    }
}
