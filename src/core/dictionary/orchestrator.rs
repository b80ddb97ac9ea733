//! Lookup Orchestrator
//!
//! Resolves a `(word, language)` pair against the cache, the local
//! dictionaries and the remote fallback, in that order.
//!
//! # Resolution order
//!
//! 1. Cache hit: returned as-is with `source = cache`.
//! 2. Local dictionaries disabled: fallback only.
//! 3. English: primary and supplement are both queried; a supplement with
//!    definitions overrides the primary's definitions.
//! 4. Other languages: the deferred bilingual dictionary for the language.
//! 5. Fallback provider, written through to the cache.
//! 6. Generic scan over the remaining registered providers.
//!
//! Provider failures are logged and treated as misses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Instrument;

use super::cache::{CacheHitStats, CacheService};
use super::error::{DictionaryError, Result};
use super::lazy::LazyDictionaryManager;
use super::provider::DictionaryProvider;
use super::registry::ProviderRegistry;
use super::types::{DictSource, DictionaryResponse};

pub const PRIMARY_LANGUAGE: &str = "en";

/// Registry names of the fixed providers.
#[derive(Debug, Clone)]
pub struct ProviderNames {
    pub primary: String,
    pub supplement: String,
    pub fallback: String,
}

impl Default for ProviderNames {
    fn default() -> Self {
        Self {
            primary: DictSource::Ecdict.as_str().to_string(),
            supplement: DictSource::Wordnet.as_str().to_string(),
            fallback: DictSource::Wiktionary.as_str().to_string(),
        }
    }
}

/// A resolved lookup.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub response: DictionaryResponse,
    /// Present only when the response came from the cache.
    pub cache_stats: Option<CacheHitStats>,
}

impl LookupOutcome {
    fn fresh(response: DictionaryResponse) -> Self {
        Self {
            response,
            cache_stats: None,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        self.cache_stats.is_some()
    }
}

pub struct LookupOrchestrator {
    registry: Arc<ProviderRegistry>,
    lazy: Arc<LazyDictionaryManager>,
    cache: Arc<CacheService>,
    names: ProviderNames,
    local_disabled: AtomicBool,
    legacy_scan_disabled: AtomicBool,
}

impl LookupOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        lazy: Arc<LazyDictionaryManager>,
        cache: Arc<CacheService>,
        names: ProviderNames,
    ) -> Self {
        Self {
            registry,
            lazy,
            cache,
            names,
            local_disabled: AtomicBool::new(false),
            legacy_scan_disabled: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn lazy(&self) -> &Arc<LazyDictionaryManager> {
        &self.lazy
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    pub fn names(&self) -> &ProviderNames {
        &self.names
    }

    /// Route every lookup straight to the fallback provider.
    pub fn set_local_disabled(&self, disabled: bool) {
        self.local_disabled.store(disabled, Ordering::SeqCst);
        tracing::info!(disabled, "Local dictionaries override changed");
    }

    pub fn local_disabled(&self) -> bool {
        self.local_disabled.load(Ordering::SeqCst)
    }

    pub fn set_legacy_scan_disabled(&self, disabled: bool) {
        self.legacy_scan_disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn legacy_scan_disabled(&self) -> bool {
        self.legacy_scan_disabled.load(Ordering::SeqCst)
    }

    pub async fn lookup(&self, word: &str, language: &str) -> Result<LookupOutcome> {
        let word = word.trim();
        let language = language.trim().to_lowercase();
        let span = tracing::info_span!("lookup", word = %word, language = %language);
        self.resolve(word, &language).instrument(span).await
    }

    async fn resolve(&self, word: &str, language: &str) -> Result<LookupOutcome> {
        if word.is_empty() {
            return Err(DictionaryError::not_found(word, language));
        }

        if let Some(hit) = self.cache.get_cached(word, language).await {
            let mut response = hit.data;
            response.cached = true;
            response.source = DictSource::Cache;
            tracing::debug!(hit_count = hit.stats.hit_count, "Served from cache");
            return Ok(LookupOutcome {
                response,
                cache_stats: Some(hit.stats),
            });
        }

        if self.local_disabled() {
            return match self.query_fallback(word, language).await {
                Some(response) => Ok(LookupOutcome::fresh(response)),
                None => Err(DictionaryError::not_found(word, language)),
            };
        }

        let mut consulted: Vec<String> = Vec::new();

        if language == PRIMARY_LANGUAGE {
            if let Some(response) = self.query_english(word, language, &mut consulted).await {
                return Ok(LookupOutcome::fresh(response));
            }
        } else if let Some(response) = self.query_bilingual(word, language, &mut consulted).await {
            return Ok(LookupOutcome::fresh(response));
        }

        consulted.push(self.names.fallback.clone());
        if let Some(response) = self.query_fallback(word, language).await {
            return Ok(LookupOutcome::fresh(response));
        }

        if !self.legacy_scan_disabled() {
            if let Some(response) = self.legacy_scan(word, language, &consulted).await {
                return Ok(LookupOutcome::fresh(response));
            }
        }

        tracing::debug!("No provider produced a result");
        Err(DictionaryError::not_found(word, language))
    }

    /// Primary plus supplement, merged.
    async fn query_english(
        &self,
        word: &str,
        language: &str,
        consulted: &mut Vec<String>,
    ) -> Option<DictionaryResponse> {
        consulted.push(self.names.primary.clone());
        consulted.push(self.names.supplement.clone());

        let (primary, supplement) = tokio::join!(
            self.query_named(&self.names.primary, word, language),
            self.query_named(&self.names.supplement, word, language),
        );

        match (primary, supplement) {
            (Some(mut base), Some(extra)) => {
                if extra.has_definitions() {
                    base.definitions = extra.definitions;
                    base.source = DictSource::EcdictWordnet;
                }
                Some(base)
            }
            (Some(base), None) => Some(base),
            (None, Some(extra)) => Some(extra),
            (None, None) => None,
        }
    }

    async fn query_bilingual(
        &self,
        word: &str,
        language: &str,
        consulted: &mut Vec<String>,
    ) -> Option<DictionaryResponse> {
        let name = self.lazy.ensure_provider_for_language(language).await?;
        consulted.push(name.clone());

        let response = self.query_named(&name, word, language).await?;
        self.lazy.touch(&name).await;
        Some(response)
    }

    async fn query_fallback(&self, word: &str, language: &str) -> Option<DictionaryResponse> {
        let response = self
            .query_named(&self.names.fallback, word, language)
            .await?;
        self.cache
            .set_cached(word, language, &response, response.source)
            .await;
        Some(response)
    }

    /// Every other available provider for the language, in priority order.
    async fn legacy_scan(
        &self,
        word: &str,
        language: &str,
        consulted: &[String],
    ) -> Option<DictionaryResponse> {
        for provider in self.registry.get_available().await {
            if consulted.iter().any(|name| name == provider.name()) {
                continue;
            }
            if let Some(response) = try_provider(provider.as_ref(), word, language).await {
                tracing::debug!(provider = %provider.name(), "Resolved by generic scan");
                self.cache
                    .set_cached(word, language, &response, response.source)
                    .await;
                return Some(response);
            }
        }
        None
    }

    async fn query_named(&self, name: &str, word: &str, language: &str) -> Option<DictionaryResponse> {
        let provider = self.registry.get(name).await?;
        try_provider(provider.as_ref(), word, language).await
    }
}

/// Consult one provider, folding absence, invalid content and errors into `None`.
async fn try_provider(
    provider: &dyn DictionaryProvider,
    word: &str,
    language: &str,
) -> Option<DictionaryResponse> {
    if !provider.is_available() || !provider.supports_language(language) {
        return None;
    }

    match provider.query(word, language).await {
        Ok(Some(mut response)) if provider.is_valid_result(&response) => {
            response.cached = false;
            Some(response)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(provider = %provider.name(), error = %e, "Provider query failed");
            None
        }
    }
}
