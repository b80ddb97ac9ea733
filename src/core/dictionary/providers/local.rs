//! Store-backed local dictionaries.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::dictionary::error::{DictionaryError, Result};
use crate::core::dictionary::lazy::ProviderFactory;
use crate::core::dictionary::provider::DictionaryProvider;
use crate::core::dictionary::storage::{LocalDictStore, MemoryDictStore, SqliteDictStore};
use crate::core::dictionary::transform::RowFormat;
use crate::core::dictionary::types::{DictSource, DictionaryResponse};

/// A provider answering from a [`LocalDictStore`].
pub struct LocalDictionaryProvider {
    name: String,
    display_name: String,
    source: DictSource,
    languages: Vec<String>,
    store: Arc<dyn LocalDictStore>,
    format: RowFormat,
    available: AtomicBool,
}

impl LocalDictionaryProvider {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        source: DictSource,
        languages: Vec<String>,
        store: Arc<dyn LocalDictStore>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            source,
            languages,
            store,
            format: RowFormat::for_source(source),
            available: AtomicBool::new(true),
        }
    }

    /// Placeholder for a dictionary whose storage failed to open.
    pub fn unavailable(
        name: impl Into<String>,
        display_name: impl Into<String>,
        source: DictSource,
        languages: Vec<String>,
    ) -> Self {
        let provider = Self::new(
            name,
            display_name,
            source,
            languages,
            Arc::new(MemoryDictStore::new()),
        );
        provider.available.store(false, Ordering::SeqCst);
        provider
    }

    pub fn with_format(mut self, format: RowFormat) -> Self {
        self.format = format;
        self
    }

    pub fn store(&self) -> &Arc<dyn LocalDictStore> {
        &self.store
    }
}

#[async_trait]
impl DictionaryProvider for LocalDictionaryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn source(&self) -> DictSource {
        self.source
    }

    fn supported_languages(&self) -> &[String] {
        &self.languages
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn query(&self, word: &str, _language: &str) -> Result<Option<DictionaryResponse>> {
        if !self.is_available() {
            return Err(DictionaryError::unavailable(&self.name));
        }
        let Some(row) = self.store.query_exact(word).await? else {
            return Ok(None);
        };
        let mut response = self.format.transform(&row, self.source)?;
        response.source = self.source;
        Ok(Some(response))
    }

    fn is_valid_result(&self, response: &DictionaryResponse) -> bool {
        match self.format {
            // Supplement rows only carry definitions.
            RowFormat::Supplement => response.has_definitions(),
            RowFormat::Ecdict | RowFormat::Bilingual => {
                response.has_translations() || response.has_definitions()
            }
        }
    }

    async fn word_count(&self) -> Option<u64> {
        if !self.is_available() {
            return None;
        }
        match self.store.count().await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "Failed to count words");
                None
            }
        }
    }

    async fn close(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            self.store.close().await;
            tracing::debug!(provider = %self.name, "Closed local dictionary");
        }
    }
}

/// Opens a SQLite-backed bidirectional dictionary on demand.
#[derive(Debug, Clone)]
pub struct SqliteProviderFactory {
    pub name: String,
    pub display_name: String,
    pub source: DictSource,
    pub languages: Vec<String>,
    pub path: PathBuf,
    pub table: String,
}

#[async_trait]
impl ProviderFactory for SqliteProviderFactory {
    async fn create(&self) -> Result<Arc<dyn DictionaryProvider>> {
        let store = SqliteDictStore::open(&self.path, &self.table).await?;
        Ok(Arc::new(LocalDictionaryProvider::new(
            self.name.clone(),
            self.display_name.clone(),
            self.source,
            self.languages.clone(),
            Arc::new(store),
        )))
    }
}
