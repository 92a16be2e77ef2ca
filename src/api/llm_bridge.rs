//! Bridge between the provider capability and the `llm` crate.

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, StructuredOutputFormat};
use std::str::FromStr;
use tracing::debug;

use super::error::{EnrichError, ProviderError};
use super::provider::{EnrichmentProvider, ProviderRegistry};
use crate::core::config::IntegrationConfig;
use crate::core::model::{CanonicalResponse, PromptOptions};
use crate::core::normalize;
use std::collections::BTreeMap;
use std::sync::Arc;

const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai/";
const SCHEMA_NAME: &str = "enrichment";

/// Resolves a provider type to an `llm` backend and its default endpoint.
///
/// Perplexity speaks the OpenAI wire protocol on its own endpoint.
fn backend_for(kind: &str) -> Result<(LLMBackend, Option<&'static str>), String> {
    match kind {
        "perplexity" => Ok((LLMBackend::OpenAI, Some(PERPLEXITY_BASE_URL))),
        other => LLMBackend::from_str(other)
            .map(|backend| (backend, None))
            .map_err(|_| format!("Unknown provider type '{}'", other)),
    }
}

fn default_models(kind: &str) -> Vec<String> {
    let models: &[&str] = match kind {
        "openai" => &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1"],
        "perplexity" => &["sonar", "sonar-pro", "sonar-reasoning"],
        _ => &[],
    };
    models.iter().map(|m| m.to_string()).collect()
}

/// A provider backed by one `llm` backend and a credentials binding.
pub struct LlmProvider {
    id: String,
    kind: String,
    api_key: Option<String>,
    base_url: Option<String>,
    models: Vec<String>,
    keyless: bool,
}

impl LlmProvider {
    /// Builds the provider of integration `name`. Unknown provider types are rejected;
    /// a missing API key is not, the provider then reports itself as unconfigured.
    pub fn from_config(name: &str, config: &IntegrationConfig) -> Result<Self, EnrichError> {
        let kind = config.provider_kind();
        let (_, default_base_url) = backend_for(&kind)
            .map_err(|e| EnrichError::Config(format!("Integration '{}': {}", name, e)))?;

        let models = if config.models.is_empty() {
            default_models(&kind)
        } else {
            config.models.clone()
        };

        Ok(Self {
            id: name.to_string(),
            api_key: config.resolve_api_key(),
            base_url: config
                .base_url
                .clone()
                .or_else(|| default_base_url.map(str::to_string)),
            models,
            keyless: config.is_keyless(),
            kind,
        })
    }

    fn client(&self, options: &PromptOptions) -> Result<Box<dyn llm::LLMProvider>, ProviderError> {
        let (backend, _) = backend_for(&self.kind).map_err(ProviderError::Unsupported)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&options.model)
            .temperature(options.temperature);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(schema) = &options.response_schema {
            let format = StructuredOutputFormat {
                name: SCHEMA_NAME.to_string(),
                description: None,
                schema: Some(schema.clone()),
                strict: Some(true),
            };
            builder = builder
                .system(format!(
                    "Reply with a single JSON value that matches this JSON schema and nothing else:\n{}",
                    schema
                ))
                .schema(format);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl EnrichmentProvider for LlmProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process_prompt(
        &self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<CanonicalResponse, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::Backend(format!(
                "Integration '{}' has no API key",
                self.id
            )));
        }

        let llm = self.client(options)?;
        debug!(
            "Calling '{}' ({}) with model {} (schema: {})",
            self.id,
            self.kind,
            options.model,
            options.response_schema.is_some()
        );

        let messages = vec![ChatMessage::user().content(prompt).build()];
        let response = llm.chat(&messages).await?;
        let text = response.text().unwrap_or_default();
        debug!("'{}' replied with {} bytes", self.id, text.len());

        Ok(normalize::from_reply(&text, options))
    }

    fn is_configured(&self) -> bool {
        self.keyless || self.api_key.is_some()
    }

    fn validate_config(&self, config: &IntegrationConfig) -> bool {
        backend_for(&config.provider_kind()).is_ok()
            && (config.is_keyless() || config.resolve_api_key().is_some())
    }

    fn model_list(&self) -> Vec<String> {
        self.models.clone()
    }
}

/// Builds a registry holding one [`LlmProvider`] per integration.
pub fn registry_from_integrations(
    integrations: &BTreeMap<String, IntegrationConfig>,
) -> Result<ProviderRegistry, EnrichError> {
    let mut registry = ProviderRegistry::new();
    for (name, config) in integrations {
        let provider = LlmProvider::from_config(name, config)?;
        registry.register(name.clone(), Arc::new(provider))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_provider_type_is_rejected() {
        let config = IntegrationConfig::new("not-a-backend");
        assert!(matches!(
            LlmProvider::from_config("x", &config),
            Err(EnrichError::Config(_))
        ));
    }

    #[test]
    fn missing_key_leaves_provider_unconfigured() {
        let mut config = IntegrationConfig::new("openai");
        config.api_key_env = Some("ROW_ENRICHER_TEST_NO_SUCH_KEY".into());
        let provider = LlmProvider::from_config("main", &config).unwrap();
        assert!(!provider.is_configured());
        assert!(!provider.validate_config(&config));
        assert_eq!(provider.id(), "main");
        assert!(provider.model_list().contains(&"gpt-4o-mini".to_string()));
    }

    #[test]
    fn keyless_backend_is_configured() {
        let mut config = IntegrationConfig::new("ollama");
        config.models = vec!["llama3".into()];
        let provider = LlmProvider::from_config("local", &config).unwrap();
        assert!(provider.is_configured());
        assert_eq!(provider.model_list(), vec!["llama3".to_string()]);
    }

    #[test]
    fn perplexity_uses_its_endpoint() {
        let config = IntegrationConfig::new("perplexity");
        let provider = LlmProvider::from_config("search", &config).unwrap();
        assert_eq!(provider.base_url.as_deref(), Some(PERPLEXITY_BASE_URL));
        assert_eq!(provider.model_list()[0], "sonar");
    }

    #[test]
    fn response_schema_is_attached_to_the_client() {
        let mut config = IntegrationConfig::new("ollama");
        config.models = vec!["llama3".into()];
        let provider = LlmProvider::from_config("local", &config).unwrap();
        let options = PromptOptions {
            model: "llama3".into(),
            temperature: 0.0,
            output_type: None,
            output_cardinality: None,
            output_categories: Vec::new(),
            response_schema: Some(json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
            })),
        };
        assert!(provider.client(&options).is_ok());
    }

    #[tokio::test]
    async fn unconfigured_provider_fails_calls() {
        let mut config = IntegrationConfig::new("openai");
        config.api_key_env = Some("ROW_ENRICHER_TEST_NO_SUCH_KEY".into());
        let provider = LlmProvider::from_config("main", &config).unwrap();
        let options = PromptOptions {
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
            output_type: None,
            output_cardinality: None,
            output_categories: Vec::new(),
            response_schema: None,
        };
        assert!(provider.process_prompt("hi", &options).await.is_err());
    }
}
