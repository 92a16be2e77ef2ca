//! The provider capability and the registry that resolves integration names.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{EnrichError, ProviderError};
use crate::core::config::IntegrationConfig;
use crate::core::model::{CanonicalResponse, PromptOptions};

/// A language-model backend able to answer enrichment prompts.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Integration name this provider is registered under.
    fn id(&self) -> &str;

    /// Sends one prompt and returns the normalized reply.
    async fn process_prompt(
        &self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<CanonicalResponse, ProviderError>;

    /// Whether the credentials this provider needs are available.
    fn is_configured(&self) -> bool;

    /// Whether `config` describes a usable instance of this provider.
    fn validate_config(&self, config: &IntegrationConfig) -> bool;

    /// Models this provider offers.
    fn model_list(&self) -> Vec<String>;
}

/// Integration name → provider, fixed once built.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn EnrichmentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider under `name`. A name can only be registered once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn EnrichmentProvider>,
    ) -> Result<(), EnrichError> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(EnrichError::Config(format!(
                "Integration '{}' is registered twice",
                name
            )));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn EnrichmentProvider>,
    ) -> Result<Self, EnrichError> {
        self.register(name, provider)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EnrichmentProvider>> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl EnrichmentProvider for Dummy {
        fn id(&self) -> &str {
            "dummy"
        }

        async fn process_prompt(
            &self,
            _prompt: &str,
            _options: &PromptOptions,
        ) -> Result<CanonicalResponse, ProviderError> {
            Ok(CanonicalResponse::default())
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn validate_config(&self, _config: &IntegrationConfig) -> bool {
            true
        }

        fn model_list(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register("a", Arc::new(Dummy)).unwrap();
        assert!(matches!(
            registry.register("a", Arc::new(Dummy)),
            Err(EnrichError::Config(_))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_none());
    }
}
