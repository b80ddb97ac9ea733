//! Dictionary Provider Trait
//!
//! The capability contract every data source implements.

use async_trait::async_trait;

use super::error::Result;
use super::types::{DictSource, DictionaryResponse};

/// A source of dictionary entries.
///
/// `query` returns `Ok(None)` when the word is simply absent; `Err` is
/// reserved for infrastructure failures, which callers treat as a miss.
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// Human readable name.
    fn display_name(&self) -> &str;

    /// Tag stamped on responses this provider produces.
    fn source(&self) -> DictSource;

    /// Language codes this provider answers for.
    fn supported_languages(&self) -> &[String];

    fn supports_language(&self, language: &str) -> bool {
        self.supported_languages()
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Whether the underlying resource initialized. Cheap and side-effect free.
    fn is_available(&self) -> bool;

    async fn query(&self, word: &str, language: &str) -> Result<Option<DictionaryResponse>>;

    /// Whether a found record carries meaningful content.
    fn is_valid_result(&self, response: &DictionaryResponse) -> bool {
        response.has_definitions() || response.has_translations()
    }

    /// Number of headwords, when the source can report it.
    async fn word_count(&self) -> Option<u64> {
        None
    }

    /// Release underlying resources. Idempotent.
    async fn close(&self);
}
