//! Remote fallback provider (Free Dictionary API compatible).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::core::dictionary::error::{DictionaryError, Result};
use crate::core::dictionary::provider::DictionaryProvider;
use crate::core::dictionary::transform::{from_api_entries, ApiEntry};
use crate::core::dictionary::types::{DictSource, DictionaryResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.dictionaryapi.dev";

const NAME: &str = "wiktionary";

/// Language codes to try for a request, most specific first.
///
/// `en-US` yields `en-us` then `en`; `pt_BR` yields `pt-br` then `pt`.
pub fn language_variants(language: &str) -> Vec<String> {
    let normalized = language.trim().to_lowercase().replace('_', "-");
    let mut variants = vec![normalized.clone()];
    if let Some((base, _)) = normalized.split_once('-') {
        if !base.is_empty() {
            variants.push(base.to_string());
        }
    }
    variants.retain(|v| !v.is_empty());
    variants
}

pub struct WiktionaryProvider {
    client: Client,
    base_url: String,
    languages: Vec<String>,
    available: AtomicBool,
}

impl WiktionaryProvider {
    pub fn new(base_url: &str, timeout: Duration, languages: Vec<String>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            languages: languages.into_iter().map(|l| l.to_lowercase()).collect(),
            available: AtomicBool::new(true),
        })
    }

    fn entries_url(&self, language: &str, word: &str) -> String {
        format!(
            "{}/api/v2/entries/{}/{}",
            self.base_url,
            urlencoding::encode(language),
            urlencoding::encode(word.trim())
        )
    }

    async fn fetch(&self, language: &str, word: &str) -> Result<Option<Vec<ApiEntry>>> {
        let url = self.entries_url(language, word);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DictionaryError::query(NAME, e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DictionaryError::query(NAME, format!("HTTP {status} for {url}")));
        }

        let entries = resp
            .json::<Vec<ApiEntry>>()
            .await
            .map_err(|e| DictionaryError::query(NAME, format!("invalid payload: {e}")))?;
        Ok(Some(entries))
    }
}

#[async_trait]
impl DictionaryProvider for WiktionaryProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn display_name(&self) -> &str {
        "Wiktionary"
    }

    fn source(&self) -> DictSource {
        DictSource::Wiktionary
    }

    fn supported_languages(&self) -> &[String] {
        &self.languages
    }

    fn supports_language(&self, language: &str) -> bool {
        language_variants(language)
            .iter()
            .any(|v| self.languages.contains(v))
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn query(&self, word: &str, language: &str) -> Result<Option<DictionaryResponse>> {
        if !self.is_available() {
            return Err(DictionaryError::unavailable(NAME));
        }

        for variant in language_variants(language) {
            match self.fetch(&variant, word).await? {
                None => {
                    tracing::debug!(word = %word, language = %variant, "Fallback miss, trying next variant");
                }
                Some(entries) => match from_api_entries(&entries, DictSource::Wiktionary) {
                    Some(response) if self.is_valid_result(&response) => {
                        return Ok(Some(response));
                    }
                    _ => {
                        tracing::debug!(word = %word, language = %variant, "Fallback entry has no content, trying next variant");
                    }
                },
            }
        }
        Ok(None)
    }

    async fn close(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}
