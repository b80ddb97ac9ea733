//! Lazy Local-Dictionary Manager
//!
//! Defers construction of optional bidirectional dictionaries until the
//! first request for one of their languages, and releases them again after
//! a period of inactivity.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded --ensure--> Loading --ok--> Loaded --idle--> Unloaded
//!                         |                                 ^
//!                         +--------------fail---------------+
//! ```
//!
//! Concurrent first requests for the same dictionary share one in-flight
//! load. The idle watcher re-reads `last_used` when it fires and sleeps again
//! if the dictionary was touched in the meantime, so `touch` never has to
//! cancel or recreate a timer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::Result;
use super::provider::DictionaryProvider;
use super::registry::ProviderRegistry;

// ============================================================================
// Descriptors
// ============================================================================

/// Builds the provider behind a lazily loaded dictionary.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn DictionaryProvider>>;
}

/// Static description of a deferred dictionary.
#[derive(Clone)]
pub struct LazyDictionaryDescriptor {
    pub name: String,
    pub display_name: String,
    pub languages: Vec<String>,
    pub priority: i32,
    pub factory: Arc<dyn ProviderFactory>,
}

impl fmt::Debug for LazyDictionaryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDictionaryDescriptor")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("languages", &self.languages)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Snapshot of one managed dictionary, for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyDictionaryStatus {
    pub name: String,
    pub languages: Vec<String>,
    pub state: LoadState,
    pub idle_secs: Option<u64>,
}

// ============================================================================
// Manager
// ============================================================================

struct ManagedDictionary {
    descriptor: LazyDictionaryDescriptor,
    loaded: bool,
    last_used: Instant,
    /// Bumped on every successful load so stale watchers stand down.
    generation: u64,
    release_task: Option<JoinHandle<()>>,
}

type LoadFuture = Shared<BoxFuture<'static, bool>>;

/// An in-progress load, tagged so a finishing task only clears its own marker.
struct InFlightLoad {
    id: u64,
    future: LoadFuture,
}

struct Inner {
    registry: Arc<ProviderRegistry>,
    idle_release: RwLock<Duration>,
    managed: RwLock<HashMap<String, ManagedDictionary>>,
    /// language -> managed dictionary name
    languages: RwLock<HashMap<String, String>>,
    in_flight: Mutex<HashMap<String, InFlightLoad>>,
    next_load_id: AtomicU64,
    constructions: AtomicU64,
}

/// Loads deferred dictionaries on demand and evicts them when idle.
///
/// Loaded providers are registered into the shared [`ProviderRegistry`] at
/// their configured priority and removed from it on release.
pub struct LazyDictionaryManager {
    inner: Arc<Inner>,
}

pub const DEFAULT_IDLE_RELEASE: Duration = Duration::from_secs(600);

impl LazyDictionaryManager {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                idle_release: RwLock::new(DEFAULT_IDLE_RELEASE),
                managed: RwLock::new(HashMap::new()),
                languages: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_load_id: AtomicU64::new(0),
                constructions: AtomicU64::new(0),
            }),
        }
    }

    /// Replace all managed state. Anything loaded before is released first.
    pub async fn configure(&self, descriptors: Vec<LazyDictionaryDescriptor>, idle_release: Duration) {
        self.close().await;

        *self.inner.idle_release.write().await = idle_release;

        let mut managed = self.inner.managed.write().await;
        let mut languages = self.inner.languages.write().await;
        for descriptor in descriptors {
            for language in &descriptor.languages {
                languages.insert(language.to_lowercase(), descriptor.name.clone());
            }
            tracing::debug!(
                dictionary = %descriptor.name,
                languages = ?descriptor.languages,
                "Managing deferred dictionary"
            );
            managed.insert(
                descriptor.name.clone(),
                ManagedDictionary {
                    descriptor,
                    loaded: false,
                    last_used: Instant::now(),
                    generation: 0,
                    release_task: None,
                },
            );
        }

        tracing::info!(
            dictionaries = managed.len(),
            idle_release_secs = idle_release.as_secs(),
            "Lazy dictionary manager configured"
        );
    }

    /// Name of the deferred dictionary serving `language`, loaded and ready.
    ///
    /// `None` when no deferred dictionary serves the language or it failed to load.
    pub async fn ensure_provider_for_language(&self, language: &str) -> Option<String> {
        let name = self.provider_for_language(language).await?;
        if self.ensure_provider(&name).await {
            Some(name)
        } else {
            None
        }
    }

    pub async fn provider_for_language(&self, language: &str) -> Option<String> {
        self.inner
            .languages
            .read()
            .await
            .get(&language.to_lowercase())
            .cloned()
    }

    /// Make sure the named dictionary is loaded and registered.
    pub async fn ensure_provider(&self, name: &str) -> bool {
        if self.try_reuse(name).await {
            return true;
        }

        let load = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(name) {
                Some(existing) => existing.future.clone(),
                None => {
                    // A load may have settled between the reuse check and the lock.
                    if self.try_reuse(name).await {
                        return true;
                    }
                    if !self.inner.managed.read().await.contains_key(name) {
                        return false;
                    }

                    let id = self.inner.next_load_id.fetch_add(1, Ordering::SeqCst);
                    let inner = self.inner.clone();
                    let key = name.to_string();
                    let task = tokio::spawn(async move {
                        let loaded = inner.load(&key, id).await;
                        let mut in_flight = inner.in_flight.lock().await;
                        if in_flight.get(&key).is_some_and(|load| load.id == id) {
                            in_flight.remove(&key);
                        }
                        loaded
                    });
                    let future: LoadFuture = async move { task.await.unwrap_or(false) }
                        .boxed()
                        .shared();
                    in_flight.insert(
                        name.to_string(),
                        InFlightLoad {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        load.await
    }

    /// Record activity on a loaded dictionary. No-op when unloaded.
    pub async fn touch(&self, name: &str) {
        let mut managed = self.inner.managed.write().await;
        if let Some(entry) = managed.get_mut(name) {
            if entry.loaded {
                entry.last_used = Instant::now();
            }
        }
    }

    pub async fn state(&self, name: &str) -> Option<LoadState> {
        if self.inner.in_flight.lock().await.contains_key(name) {
            return Some(LoadState::Loading);
        }
        self.inner.managed.read().await.get(name).map(|entry| {
            if entry.loaded {
                LoadState::Loaded
            } else {
                LoadState::Unloaded
            }
        })
    }

    pub async fn is_loaded(&self, name: &str) -> bool {
        self.inner
            .managed
            .read()
            .await
            .get(name)
            .map(|entry| entry.loaded)
            .unwrap_or(false)
    }

    /// Total provider constructions attempted since start.
    pub fn construction_count(&self) -> u64 {
        self.inner.constructions.load(Ordering::SeqCst)
    }

    pub async fn statuses(&self) -> Vec<LazyDictionaryStatus> {
        let in_flight: Vec<String> = self.inner.in_flight.lock().await.keys().cloned().collect();
        let managed = self.inner.managed.read().await;
        let mut statuses: Vec<LazyDictionaryStatus> = managed
            .iter()
            .map(|(name, entry)| {
                let state = if in_flight.contains(name) {
                    LoadState::Loading
                } else if entry.loaded {
                    LoadState::Loaded
                } else {
                    LoadState::Unloaded
                };
                LazyDictionaryStatus {
                    name: name.clone(),
                    languages: entry.descriptor.languages.clone(),
                    state,
                    idle_secs: entry.loaded.then(|| entry.last_used.elapsed().as_secs()),
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Cancel all timers, unregister loaded dictionaries and forget everything.
    pub async fn close(&self) {
        let drained: Vec<(String, ManagedDictionary)> =
            self.inner.managed.write().await.drain().collect();
        self.inner.languages.write().await.clear();
        self.inner.in_flight.lock().await.clear();

        for (name, entry) in drained {
            if let Some(task) = entry.release_task {
                task.abort();
            }
            if entry.loaded {
                self.inner.registry.unregister(&name).await;
            }
        }
    }

    async fn try_reuse(&self, name: &str) -> bool {
        if !self.is_loaded(name).await {
            return false;
        }
        match self.inner.registry.get(name).await {
            Some(provider) if provider.is_available() => {
                self.touch(name).await;
                true
            }
            _ => false,
        }
    }
}

impl Inner {
    async fn load(self: &Arc<Self>, name: &str, load_id: u64) -> bool {
        let descriptor = match self.managed.read().await.get(name) {
            Some(entry) => entry.descriptor.clone(),
            None => return false,
        };

        self.constructions.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();

        let provider = match descriptor.factory.create().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!(dictionary = %name, error = %e, "Failed to load dictionary");
                self.mark_unloaded(name).await;
                return false;
            }
        };

        // Closed or reconfigured while constructing.
        if !self.owns_load(name, load_id).await {
            tracing::debug!(dictionary = %name, "Discarding superseded dictionary load");
            provider.close().await;
            return false;
        }

        if !provider.is_available() {
            tracing::warn!(dictionary = %name, "Dictionary loaded but reports unavailable");
            provider.close().await;
            self.mark_unloaded(name).await;
            return false;
        }

        self.registry.register(provider, descriptor.priority).await;

        let idle_release = *self.idle_release.read().await;
        let mut managed = self.managed.write().await;
        let Some(entry) = managed.get_mut(name) else {
            // Reconfigured while loading.
            drop(managed);
            self.registry.unregister(name).await;
            return false;
        };

        entry.loaded = true;
        entry.last_used = Instant::now();
        entry.generation += 1;
        if let Some(previous) = entry.release_task.take() {
            previous.abort();
        }
        entry.release_task = Some(tokio::spawn(watch_idle(
            Arc::downgrade(self),
            name.to_string(),
            entry.generation,
            idle_release,
        )));

        tracing::info!(
            dictionary = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded deferred dictionary"
        );
        true
    }

    async fn owns_load(&self, name: &str, load_id: u64) -> bool {
        self.in_flight
            .lock()
            .await
            .get(name)
            .is_some_and(|load| load.id == load_id)
    }

    async fn mark_unloaded(&self, name: &str) {
        if let Some(entry) = self.managed.write().await.get_mut(name) {
            entry.loaded = false;
        }
    }

    /// Evict the dictionary if it has been idle for `idle_release`.
    ///
    /// The idle check and the eviction happen under one write lock, so a
    /// concurrent `touch` either lands first and keeps the dictionary or lands
    /// after it is already unloaded.
    async fn release(&self, name: &str, generation: u64, idle_release: Duration) -> Release {
        let provider = {
            let mut managed = self.managed.write().await;
            match managed.get_mut(name) {
                Some(entry) if entry.loaded && entry.generation == generation => {
                    let idle_for = Instant::now().saturating_duration_since(entry.last_used);
                    if idle_for < idle_release {
                        return Release::Busy(entry.last_used);
                    }
                    entry.loaded = false;
                    // Dropping our own handle detaches rather than aborts.
                    entry.release_task = None;
                }
                _ => return Release::Stale,
            }
            self.registry.remove(name).await
        };

        if let Some(provider) = provider {
            provider.close().await;
        }
        tracing::info!(dictionary = %name, "Released idle dictionary");
        Release::Released
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Released,
    /// Used since the watcher armed; holds the latest `last_used`.
    Busy(Instant),
    /// Already unloaded or reloaded under a newer generation.
    Stale,
}

async fn watch_idle(inner: Weak<Inner>, name: String, generation: u64, idle_release: Duration) {
    let mut deadline = Instant::now() + idle_release;
    loop {
        tokio::time::sleep_until(deadline).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };

        match inner.release(&name, generation, idle_release).await {
            Release::Busy(last_used) => deadline = last_used + idle_release,
            Release::Released | Release::Stale => return,
        }
    }
}
