//! Dictionary Service
//!
//! The process-wide context: registry, lazy manager, cache and orchestrator,
//! built once at start-up and torn down at shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::cache::{
    CacheInfo, CacheService, CacheSettings, MemoryCacheBackend, RedisCacheBackend,
};
use super::error::Result;
use super::lazy::{LazyDictionaryDescriptor, LazyDictionaryManager, LazyDictionaryStatus};
use super::orchestrator::{LookupOrchestrator, LookupOutcome, ProviderNames};
use super::providers::{LocalDictionaryProvider, SqliteProviderFactory, WiktionaryProvider};
use super::registry::ProviderRegistry;
use super::storage::{LocalDictStore, SqliteDictStore};
use super::types::{DictSource, ProviderStatus};
use crate::config::{AppConfig, CacheConfig, LocalDictionaryConfig};

pub const DEFAULT_SUGGEST_LIMIT: usize = 10;
pub const MAX_SUGGEST_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub backend: Option<String>,
    pub ready: bool,
    pub ttl_days: u64,
}

/// Payload of the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub providers: Vec<ProviderStatus>,
    /// Headwords in the primary local dictionary.
    pub word_count: Option<u64>,
    pub cache: CacheHealth,
    pub lazy_dictionaries: Vec<LazyDictionaryStatus>,
    pub local_dictionaries_disabled: bool,
}

pub struct DictionaryService {
    orchestrator: Arc<LookupOrchestrator>,
    primary_store: Option<Arc<dyn LocalDictStore>>,
}

impl DictionaryService {
    pub fn new(
        orchestrator: Arc<LookupOrchestrator>,
        primary_store: Option<Arc<dyn LocalDictStore>>,
    ) -> Self {
        Self {
            orchestrator,
            primary_store,
        }
    }

    /// Build every component from configuration.
    ///
    /// Missing or broken dictionaries are registered as unavailable rather
    /// than failing start-up.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::new());
        let names = ProviderNames::default();
        let dicts = &config.dictionaries;

        let mut primary_store = None;
        if dicts.ecdict.enabled {
            let store = open_store(&dicts.ecdict, &names.primary).await;
            primary_store = store.clone();
            let provider = local_provider(&names.primary, "ECDICT", DictSource::Ecdict, store);
            registry.register(provider, dicts.ecdict.priority).await;
        }

        if dicts.supplement.enabled {
            let store = open_store(&dicts.supplement, &names.supplement).await;
            let provider = local_provider(&names.supplement, "WordNet", DictSource::Wordnet, store);
            registry.register(provider, dicts.supplement.priority).await;
        }

        if config.fallback.enabled {
            let fallback = WiktionaryProvider::new(
                &config.fallback.base_url,
                Duration::from_secs(config.fallback.timeout_secs.max(1)),
                config.fallback.languages.clone(),
            )?;
            registry
                .register(Arc::new(fallback), config.fallback.priority)
                .await;
        }

        let lazy = Arc::new(LazyDictionaryManager::new(registry.clone()));
        let mut descriptors = Vec::new();
        for dict in dicts.bilingual.iter().filter(|d| d.enabled) {
            let source = dict.source_tag()?;
            let Some(path) = dict.path.clone() else {
                tracing::warn!(language = %dict.language, source = %source, "Bilingual dictionary has no path, skipping");
                continue;
            };
            let display_name = if dict.display_name.is_empty() {
                source.as_str().to_string()
            } else {
                dict.display_name.clone()
            };
            let languages = vec![dict.language.to_lowercase()];
            descriptors.push(LazyDictionaryDescriptor {
                name: source.as_str().to_string(),
                display_name: display_name.clone(),
                languages: languages.clone(),
                priority: dict.priority,
                factory: Arc::new(SqliteProviderFactory {
                    name: source.as_str().to_string(),
                    display_name,
                    source,
                    languages,
                    path,
                    table: dict.table.clone(),
                }),
            });
        }
        lazy.configure(descriptors, Duration::from_secs(dicts.idle_release_secs))
            .await;

        let cache = Arc::new(build_cache(&config.cache).await);

        let orchestrator = Arc::new(LookupOrchestrator::new(registry, lazy, cache, names));
        orchestrator.set_local_disabled(config.admin.disable_local_dictionaries);
        orchestrator.set_legacy_scan_disabled(config.admin.disable_legacy_scan);

        tracing::info!(
            providers = orchestrator.registry().len().await,
            cache = orchestrator.cache().backend_name().unwrap_or("disabled"),
            "Dictionary service ready"
        );
        Ok(Self::new(orchestrator, primary_store))
    }

    pub fn orchestrator(&self) -> &Arc<LookupOrchestrator> {
        &self.orchestrator
    }

    pub async fn lookup(&self, word: &str, language: &str) -> Result<LookupOutcome> {
        self.orchestrator.lookup(word, language).await
    }

    pub async fn health(&self) -> HealthReport {
        let registry = self.orchestrator.registry();
        let word_count = match registry.get(&self.orchestrator.names().primary).await {
            Some(primary) => primary.word_count().await,
            None => None,
        };
        let cache = self.orchestrator.cache();

        HealthReport {
            status: "ok",
            providers: registry.statuses().await,
            word_count,
            cache: CacheHealth {
                backend: cache.backend_name().map(str::to_string),
                ready: cache.is_ready(),
                ttl_days: cache.effective_ttl_days().await,
            },
            lazy_dictionaries: self.orchestrator.lazy().statuses().await,
            local_dictionaries_disabled: self.orchestrator.local_disabled(),
        }
    }

    /// Headwords at or after `word` in the primary dictionary.
    pub async fn suggest(&self, word: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let limit = limit
            .unwrap_or(DEFAULT_SUGGEST_LIMIT)
            .clamp(1, MAX_SUGGEST_LIMIT);
        match &self.primary_store {
            Some(store) if !word.trim().is_empty() => store.scan_from(word, limit).await,
            _ => Ok(Vec::new()),
        }
    }

    pub async fn cache_info(&self, word: &str, language: &str) -> Option<CacheInfo> {
        self.orchestrator.cache().get_cache_info(word, language).await
    }

    pub async fn delete_cached(&self, word: &str, language: &str) -> bool {
        self.orchestrator.cache().delete_cached(word, language).await
    }

    pub async fn set_cache_ttl_days(&self, days: u64) -> Result<()> {
        self.orchestrator.cache().set_ttl_days(days).await
    }

    /// Release every dictionary. Called once at process shutdown.
    pub async fn shutdown(&self) {
        self.orchestrator.lazy().close().await;
        self.orchestrator.registry().close_all().await;
        tracing::info!("Dictionary service shut down");
    }
}

async fn open_store(config: &LocalDictionaryConfig, name: &str) -> Option<Arc<dyn LocalDictStore>> {
    let Some(path) = config.path.as_deref() else {
        tracing::warn!(dictionary = %name, "No path configured, dictionary unavailable");
        return None;
    };
    match open_sqlite(path, &config.table).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(dictionary = %name, path = %path.display(), error = %e, "Failed to open dictionary");
            None
        }
    }
}

async fn open_sqlite(path: &Path, table: &str) -> Result<Arc<dyn LocalDictStore>> {
    let store = SqliteDictStore::open(path, table).await?;
    Ok(Arc::new(store))
}

fn local_provider(
    name: &str,
    display_name: &str,
    source: DictSource,
    store: Option<Arc<dyn LocalDictStore>>,
) -> Arc<LocalDictionaryProvider> {
    let languages = vec!["en".to_string()];
    Arc::new(match store {
        Some(store) => LocalDictionaryProvider::new(name, display_name, source, languages, store),
        None => LocalDictionaryProvider::unavailable(name, display_name, source, languages),
    })
}

async fn build_cache(config: &CacheConfig) -> CacheService {
    if !config.enabled {
        tracing::info!("Lookup cache disabled");
        return CacheService::disabled();
    }

    let settings = CacheSettings {
        key_prefix: config.key_prefix.clone(),
        default_ttl_days: config.default_ttl_days,
        ttl_control_key: config.ttl_control_key.clone(),
    };

    let url = config.url.trim();
    if url.is_empty() || url.eq_ignore_ascii_case("memory") {
        return CacheService::new(
            Arc::new(MemoryCacheBackend::new(config.memory_capacity)),
            settings,
        );
    }

    match RedisCacheBackend::connect(url).await {
        Ok(backend) => CacheService::new(Arc::new(backend), settings),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, lookups will not be cached");
            CacheService::disabled()
        }
    }
}
