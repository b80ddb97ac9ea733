//! Multi-Source Dictionary Lookup
//!
//! Resolves a word in a language to one unified [`DictionaryResponse`] by
//! consulting, in priority order, a result cache, local offline
//! dictionaries and a remote fallback API.
//!
//! # Architecture
//!
//! ```text
//!                 +-------------------------+
//!                 |   LookupOrchestrator    |
//!                 +-------------------------+
//!                   |          |          |
//!                   v          v          v
//!          +-------------+ +----------+ +-----------------------+
//!          | CacheService| | Provider | | LazyDictionaryManager |
//!          |             | | Registry | | (deferred bilinguals) |
//!          +-------------+ +----------+ +-----------------------+
//!                 |             |                  |
//!                 v             v                  v
//!          memory / redis   ecdict, wordnet,   kengdic, jmdict,
//!                           wiktionary         ding, freedict-rus
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use polydict::config::AppConfig;
//! use polydict::core::dictionary::DictionaryService;
//!
//! let service = DictionaryService::from_config(&AppConfig::load()?).await?;
//! let outcome = service.lookup("hello", "en").await?;
//! println!("{}", outcome.response.source);
//! ```

pub mod cache;
pub mod error;
pub mod lazy;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod server;
pub mod service;
pub mod storage;
pub mod transform;
pub mod types;

#[cfg(test)]
mod test_support;

pub use cache::{CacheHitStats, CacheService, CacheSettings};
pub use error::{DictionaryError, Result};
pub use lazy::{LazyDictionaryDescriptor, LazyDictionaryManager, LoadState, ProviderFactory};
pub use orchestrator::{LookupOrchestrator, LookupOutcome, ProviderNames};
pub use provider::DictionaryProvider;
pub use registry::ProviderRegistry;
pub use service::{DictionaryService, HealthReport};
pub use types::{
    CacheEntry, Definition, DictSource, DictionaryResponse, Exchange, Frequency, Regional,
    Translation,
};
