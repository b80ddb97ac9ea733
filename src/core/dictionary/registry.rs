//! Provider Registry
//!
//! Priority-ordered collection of dictionary providers. The registry knows
//! nothing about language routing; the orchestrator decides which provider
//! to consult.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::provider::DictionaryProvider;
use super::types::{ProviderDescriptor, ProviderStatus};

struct RegisteredProvider {
    provider: Arc<dyn DictionaryProvider>,
    priority: i32,
}

/// Shared registry of providers, sorted by descending priority.
///
/// Equal priorities keep insertion order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<Vec<RegisteredProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same name.
    ///
    /// A replaced provider is not closed; its owner decides its lifetime.
    pub async fn register(&self, provider: Arc<dyn DictionaryProvider>, priority: i32) {
        let name = provider.name().to_string();
        let mut providers = self.providers.write().await;

        if let Some(pos) = providers.iter().position(|p| p.provider.name() == name) {
            providers.remove(pos);
            tracing::debug!(provider = %name, "Replacing registered provider");
        }

        providers.push(RegisteredProvider { provider, priority });
        // Vec::sort_by is stable
        providers.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::info!(provider = %name, priority, "Registered dictionary provider");
    }

    /// Close and remove a provider. Returns false if it was not registered.
    pub async fn unregister(&self, name: &str) -> bool {
        match self.remove(name).await {
            Some(provider) => {
                provider.close().await;
                tracing::info!(provider = %name, "Unregistered dictionary provider");
                true
            }
            None => false,
        }
    }

    /// Remove a provider without closing it, handing it back to the caller.
    pub async fn remove(&self, name: &str) -> Option<Arc<dyn DictionaryProvider>> {
        let mut providers = self.providers.write().await;
        providers
            .iter()
            .position(|p| p.provider.name() == name)
            .map(|pos| providers.remove(pos).provider)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn DictionaryProvider>> {
        self.providers
            .read()
            .await
            .iter()
            .find(|p| p.provider.name() == name)
            .map(|p| p.provider.clone())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Priority-ordered snapshot of every provider.
    pub async fn get_all(&self) -> Vec<Arc<dyn DictionaryProvider>> {
        self.providers
            .read()
            .await
            .iter()
            .map(|p| p.provider.clone())
            .collect()
    }

    /// Priority-ordered snapshot of providers that report available.
    pub async fn get_available(&self) -> Vec<Arc<dyn DictionaryProvider>> {
        self.providers
            .read()
            .await
            .iter()
            .filter(|p| p.provider.is_available())
            .map(|p| p.provider.clone())
            .collect()
    }

    pub async fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers
            .read()
            .await
            .iter()
            .map(|p| ProviderDescriptor {
                name: p.provider.name().to_string(),
                display_name: p.provider.display_name().to_string(),
                supported_languages: p.provider.supported_languages().to_vec(),
                priority: p.priority,
            })
            .collect()
    }

    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        self.providers
            .read()
            .await
            .iter()
            .map(|p| ProviderStatus {
                name: p.provider.name().to_string(),
                display_name: p.provider.display_name().to_string(),
                available: p.provider.is_available(),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.providers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.providers.read().await.is_empty()
    }

    /// Close and remove every provider.
    pub async fn close_all(&self) {
        let drained: Vec<RegisteredProvider> = self.providers.write().await.drain(..).collect();
        for entry in drained {
            entry.provider.close().await;
        }
    }
}
