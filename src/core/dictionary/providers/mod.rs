//! Dictionary Provider Implementations
//!
//! Concrete `DictionaryProvider`s: store-backed local dictionaries and the
//! remote fallback.

mod local;
mod wiktionary;

pub use local::{LocalDictionaryProvider, SqliteProviderFactory};
pub use wiktionary::{language_variants, WiktionaryProvider, DEFAULT_BASE_URL};
