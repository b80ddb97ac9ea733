//! Cache backends.
//!
//! A backend is a string key/value store with per-key expiry. The in-memory
//! backend bounds its size with an LRU; the Redis backend lives in
//! [`super::redis_backend`].

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::core::dictionary::error::Result;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend should be used right now.
    fn is_ready(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value`; `ttl = None` stores it without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    async fn delete(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// In-memory backend
// ============================================================================

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Process-local backend. Least recently used keys are evicted at capacity.
pub struct MemoryCacheBackend {
    entries: Mutex<LruCache<String, MemoryEntry>>,
    ready: AtomicBool,
}

impl MemoryCacheBackend {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ready: AtomicBool::new(true),
        }
    }

    /// Toggle readiness, e.g. to simulate an outage.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(match entries.peek(key) {
            None => KeyTtl::Missing,
            Some(entry) if entry.is_expired(now) => KeyTtl::Missing,
            Some(MemoryEntry { expires_at: None, .. }) => KeyTtl::Persistent,
            Some(MemoryEntry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.pop(key).is_some())
    }
}
