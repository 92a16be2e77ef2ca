#![allow(dead_code)]

use async_trait::async_trait;
use row_enricher::core::config::IntegrationConfig;
use row_enricher::core::normalize::from_reply;
use row_enricher::{
    CanonicalResponse, EnrichmentProvider, PromptOptions, ProviderError, ProviderRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Script =
    Box<dyn Fn(&str, &PromptOptions) -> Result<CanonicalResponse, ProviderError> + Send + Sync>;

/// Provider answering from a script, recording every prompt it receives.
pub struct MockProvider {
    id: String,
    configured: bool,
    script: Script,
    delay: Option<Box<dyn Fn(&str) -> Duration + Send + Sync>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new<F>(id: &str, script: F) -> Self
    where
        F: Fn(&str, &PromptOptions) -> Result<CanonicalResponse, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.to_string(),
            configured: true,
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the same raw text to every prompt, normalized like a real backend.
    pub fn replying(id: &str, reply: &'static str) -> Self {
        Self::new(id, move |_, options| Ok(from_reply(reply, options)))
    }

    /// Replies with the same structured object to every prompt, without schema checks.
    pub fn structured(id: &str, reply: serde_json::Value) -> Self {
        Self::new(id, move |_, _| Ok(CanonicalResponse::structured(reply.clone())))
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnrichmentProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process_prompt(
        &self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<CanonicalResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        (self.script)(prompt, options)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn validate_config(&self, _config: &IntegrationConfig) -> bool {
        self.configured
    }

    fn model_list(&self) -> Vec<String> {
        vec!["mock-1".to_string()]
    }
}

pub fn registry(provider: Arc<MockProvider>) -> ProviderRegistry {
    let name = provider.id().to_string();
    ProviderRegistry::new().with(name, provider).unwrap()
}

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub fn widget_table() -> (Vec<String>, Vec<Vec<String>>) {
    (strings(&["id", "name"]), vec![strings(&["1", "Widget"])])
}

/// `count` rows of `[index, item-<index>]`.
pub fn numbered_table(count: usize) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = (0..count)
        .map(|i| vec![i.to_string(), format!("item-{}", i)])
        .collect();
    (strings(&["id", "name"]), rows)
}
