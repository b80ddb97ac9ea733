//! Error types for dictionary lookups.
//!
//! Provider and cache failures are absorbed by the orchestrator; only
//! `NotFound` and unexpected failures reach the HTTP layer.

use thiserror::Error;

/// Unified error type for dictionary operations.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// Word absent from every consulted source.
    #[error("No definitions found for '{word}' ({language})")]
    NotFound { word: String, language: String },

    /// A source failed to initialize or lost its connection.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Transient failure while querying a provider.
    #[error("Provider query failed: {provider}: {message}")]
    ProviderQuery { provider: String, message: String },

    /// Cache backend failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Local storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid settings or missing values.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DictionaryError {
    pub fn not_found(word: impl Into<String>, language: impl Into<String>) -> Self {
        Self::NotFound {
            word: word.into(),
            language: language.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }

    pub fn query(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderQuery {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<redis::RedisError> for DictionaryError {
    fn from(e: redis::RedisError) -> Self {
        DictionaryError::Cache(e.to_string())
    }
}

/// Result type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, DictionaryError>;
