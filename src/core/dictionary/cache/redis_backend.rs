//! Redis cache backend.
//!
//! Uses a multiplexed [`ConnectionManager`] that reconnects on its own. After
//! a connection-level failure the backend reports not-ready for a short
//! cool-down so lookups skip the cache instead of waiting on a dead socket.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisError;

use super::backend::{CacheBackend, KeyTtl};
use crate::core::dictionary::error::{DictionaryError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const FAILURE_COOLDOWN: Duration = Duration::from_secs(10);

pub struct RedisCacheBackend {
    manager: ConnectionManager,
    failed_at: Mutex<Option<Instant>>,
}

impl RedisCacheBackend {
    /// Connect to `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| DictionaryError::cache(format!("timed out connecting to {url}")))??;

        tracing::info!(url = %url, "Connected to Redis cache");
        Ok(Self {
            manager,
            failed_at: Mutex::new(None),
        })
    }

    fn record(&self, result: &std::result::Result<impl Sized, RedisError>) {
        let Ok(mut failed_at) = self.failed_at.lock() else {
            return;
        };
        match result {
            Ok(_) => *failed_at = None,
            Err(e) if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() => {
                tracing::warn!(error = %e, "Redis connection failure, bypassing cache");
                *failed_at = Some(Instant::now());
            }
            Err(_) => {}
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &str {
        "redis"
    }

    fn is_ready(&self) -> bool {
        match self.failed_at.lock() {
            Ok(failed_at) => failed_at
                .map(|at| at.elapsed() >= FAILURE_COOLDOWN)
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.manager.clone();
        let result: std::result::Result<Option<String>, RedisError> =
            redis::cmd("GET").arg(key).query_async(&mut con).await;
        self.record(&result);
        Ok(result?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut con = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX 0 is rejected by Redis
            cmd.arg("PX").arg((ttl.as_millis() as u64).max(1));
        }
        let result: std::result::Result<(), RedisError> = cmd.query_async(&mut con).await;
        self.record(&result);
        Ok(result?)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut con = self.manager.clone();
        let result: std::result::Result<i64, RedisError> =
            redis::cmd("PTTL").arg(key).query_async(&mut con).await;
        self.record(&result);
        Ok(match result? {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::Expires(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut con = self.manager.clone();
        let result: std::result::Result<i64, RedisError> =
            redis::cmd("DEL").arg(key).query_async(&mut con).await;
        self.record(&result);
        Ok(result? > 0)
    }
}
