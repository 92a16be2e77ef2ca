//! Library surface: run enrichment jobs against registered providers.

mod enricher;
mod error;
mod llm_bridge;
mod provider;
mod runner;

pub use enricher::{select_rows, Enricher};
pub use error::{EnrichError, ProviderError};
pub use llm_bridge::{registry_from_integrations, LlmProvider};
pub use provider::{EnrichmentProvider, ProviderRegistry};
pub use runner::{
    combined_prompt, output_context, output_prompt, plan_row, process_row, PlannedCall,
};
