//! The main entry point for enriching a table.

use futures::stream::{self, StreamExt};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::error::EnrichError;
use super::llm_bridge::registry_from_integrations;
use super::provider::{EnrichmentProvider, ProviderRegistry};
use super::runner::process_row;
use crate::core::config::parse_integrations;
use crate::core::format;
use crate::core::model::{EnrichmentConfig, EnrichmentResult, RowContext, RowResult, RunMode};

/// Runs enrichment jobs against the providers of a registry.
///
/// Create it once and reuse it; a run only borrows the registry.
pub struct Enricher {
    registry: ProviderRegistry,
    concurrency: usize,
}

impl Enricher {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            concurrency: 1,
        }
    }

    /// Builds an enricher over the integrations declared in a TOML file.
    ///
    /// A missing file yields an enricher without providers.
    pub fn from_integrations_file(path: &Path) -> Result<Self, EnrichError> {
        if !path.exists() {
            debug!("No integrations file at {}", path.display());
            return Ok(Self::new(ProviderRegistry::new()));
        }
        let content = fs::read_to_string(path)?;
        let integrations = parse_integrations(&content)
            .map_err(|e| EnrichError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(registry_from_integrations(&integrations)?))
    }

    /// Number of rows processed at once. Results keep row order whatever the value.
    pub fn concurrency(mut self, rows: usize) -> Self {
        self.concurrency = rows.max(1);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Enriches the selected rows of `rows` and returns the enriched table.
    ///
    /// Only setup problems are returned as `Err`. A row whose provider call fails ends
    /// up in [`EnrichmentResult::errors`] and the run carries on with the next row.
    pub async fn run(
        &self,
        config: &EnrichmentConfig,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> Result<EnrichmentResult, EnrichError> {
        if headers.is_empty() {
            return Err(EnrichError::InvalidInput("headers are empty".to_string()));
        }
        if rows.is_empty() {
            return Err(EnrichError::InvalidInput("no rows to enrich".to_string()));
        }
        config.validate().map_err(EnrichError::InvalidInput)?;

        let provider = self
            .registry
            .get(&config.integration_name)
            .ok_or_else(|| EnrichError::ProviderNotFound(config.integration_name.clone()))?;
        if !provider.is_configured() {
            return Err(EnrichError::ProviderNotConfigured(
                config.integration_name.clone(),
            ));
        }

        let contexts: Vec<RowContext> = select_rows(config, rows.len())
            .into_iter()
            .map(|index| RowContext::new(index, headers, &rows[index], &config.context_columns))
            .collect();

        info!(
            "Enriching {} of {} rows ({:?} mode) with '{}' / {}",
            contexts.len(),
            rows.len(),
            config.mode,
            provider.id(),
            config.model
        );

        let provider: &dyn EnrichmentProvider = &**provider;
        let row_results: Vec<RowResult> = stream::iter(contexts.iter())
            .map(|ctx| process_row(ctx, config, provider))
            .buffered(self.concurrency)
            .collect()
            .await;

        let result = format::format(&row_results, config, headers, rows);
        debug!(
            "Formatted {} rows",
            result.new_rows.as_ref().map_or(0, Vec::len)
        );
        info!(
            "Processed {} rows, {} failed",
            result.processed_row_count,
            result.errors.len()
        );
        Ok(result)
    }
}

/// Indices of the rows a run touches, ascending.
pub fn select_rows(config: &EnrichmentConfig, row_count: usize) -> Vec<usize> {
    match config.mode {
        RunMode::Full => (0..row_count).collect(),
        RunMode::Preview => (0..config.preview_row_count.min(row_count)).collect(),
    }
}
