//! Loads the integration definitions that back the provider registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(default)]
    integrations: BTreeMap<String, IntegrationConfig>,
}

/// One named provider instance: backend type plus credentials binding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IntegrationConfig {
    /// Backend type, e.g. `openai`, `perplexity`, `anthropic`, `ollama`.
    pub provider: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Models offered by this integration.
    #[serde(default)]
    pub models: Vec<String>,
}

impl IntegrationConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key_env: None,
            base_url: None,
            models: Vec::new(),
        }
    }

    /// Backend type, lowercased.
    pub fn provider_kind(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    /// Whether the backend works without an API key.
    pub fn is_keyless(&self) -> bool {
        matches!(self.provider_kind().as_str(), "ollama")
    }

    /// Name of the environment variable the API key is read from.
    pub fn api_key_env_var(&self) -> Option<String> {
        if let Some(var) = &self.api_key_env {
            return Some(var.clone());
        }
        let var = match self.provider_kind().as_str() {
            "openai" => "OPENAI_API_KEY",
            "perplexity" => "PERPLEXITY_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            "google" => "GOOGLE_API_KEY",
            "groq" => "GROQ_API_KEY",
            "xai" => "XAI_API_KEY",
            "cohere" => "COHERE_API_KEY",
            "deepseek" => "DEEPSEEK_API_KEY",
            "mistral" => "MISTRAL_API_KEY",
            _ => return None,
        };
        Some(var.to_string())
    }

    /// Reads the API key from the environment. Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        let var = self.api_key_env_var()?;
        env::var(var).ok().filter(|key| !key.trim().is_empty())
    }
}

/// Default location of the integrations file: `~/.row-enricher/config.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    let home = env::var("HOME").map_err(|_| "Unable to determine HOME directory".to_string())?;
    Ok(PathBuf::from(home).join(".row-enricher").join("config.toml"))
}

/// Loads integrations from a TOML file. A missing file yields no integrations.
pub fn load_integrations(path: &Path) -> Result<BTreeMap<String, IntegrationConfig>, String> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_integrations(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Parses the `[integrations.<name>]` tables of an integrations file.
pub fn parse_integrations(content: &str) -> Result<BTreeMap<String, IntegrationConfig>, String> {
    let config: Config =
        toml::from_str(content).map_err(|e| format!("Failed to parse integrations: {}", e))?;
    for (name, integration) in &config.integrations {
        if integration.provider.trim().is_empty() {
            return Err(format!("Integration '{}' has an empty provider type", name));
        }
    }
    Ok(config.integrations)
}
