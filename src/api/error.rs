//! Error types for the library API.

use llm::error::LLMError;
use thiserror::Error;

/// Failures that abort a whole enrichment run before any row is processed.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// The config, headers or rows handed to the run are unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No provider is registered under the requested integration name.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// The provider exists but lacks the credentials it needs.
    #[error("Provider '{0}' is not configured (missing credentials?)")]
    ProviderNotConfigured(String),

    /// An integration or preset file is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An integrations file exists but could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The vendor call itself failed.
    #[error("Provider backend error: {0}")]
    Backend(String),

    /// The provider cannot serve this request.
    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

impl From<LLMError> for ProviderError {
    fn from(e: LLMError) -> Self {
        ProviderError::Backend(e.to_string())
    }
}
