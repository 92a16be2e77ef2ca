pub mod api;
pub mod cli;
pub mod commands;
pub mod core;

pub use api::{EnrichError, Enricher, EnrichmentProvider, LlmProvider, ProviderError, ProviderRegistry};
pub use crate::core::model::{
    CanonicalResponse, EnrichmentConfig, EnrichmentResult, OutputCardinality, OutputCategory,
    OutputFormat, OutputSpec, OutputType, PromptOptions, ResponseValue, RowContext, RunMode,
};
