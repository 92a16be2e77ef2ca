//! Processing of a single row: prompt rendering, provider calls and fan-back.

use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, warn};

use super::provider::EnrichmentProvider;
use crate::core::model::{
    CanonicalResponse, EnrichmentConfig, OutputResult, OutputSpec, PromptOptions, RowContext,
    RowResult,
};
use crate::core::normalize::normalize_structured;
use crate::core::schema;
use crate::core::template::render;

/// One provider call planned for a row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    /// Output answered by this call; `None` when the call answers every output.
    pub output: Option<String>,
    pub prompt: String,
    pub options: PromptOptions,
}

/// The row as one output sees it: its own context columns replace the block-level ones.
pub fn output_context<'a>(spec: &OutputSpec, ctx: &'a RowContext) -> Cow<'a, RowContext> {
    match &spec.context_columns {
        Some(columns) => Cow::Owned(ctx.with_context_columns(columns)),
        None => Cow::Borrowed(ctx),
    }
}

/// Renders the template of one output.
pub fn output_prompt(spec: &OutputSpec, ctx: &RowContext) -> String {
    render(&spec.prompt, &output_context(spec, ctx))
}

/// All outputs of a row in one prompt, one `### <name>` section per output.
pub fn combined_prompt(outputs: &[OutputSpec], ctx: &RowContext) -> String {
    outputs
        .iter()
        .map(|spec| format!("### {}\n{}", spec.name, output_prompt(spec, ctx)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The provider calls a row needs: exactly one when outputs are combined, otherwise one
/// per output in declaration order.
pub fn plan_row(ctx: &RowContext, config: &EnrichmentConfig) -> Vec<PlannedCall> {
    if config.combine_outputs {
        let combined = schema::combined_schema(&config.outputs);
        return vec![PlannedCall {
            output: None,
            prompt: combined_prompt(&config.outputs, ctx),
            options: PromptOptions::combined(config, combined),
        }];
    }

    config
        .outputs
        .iter()
        .map(|spec| PlannedCall {
            output: Some(spec.name.clone()),
            prompt: output_prompt(spec, ctx),
            options: PromptOptions::for_output(
                config,
                spec,
                schema::build_schema(std::slice::from_ref(spec), false),
            ),
        })
        .collect()
}

/// Runs every output of one row against `provider`.
///
/// Never fails: a failed combined call becomes a row-level error, a failed per-output
/// call drops that output from the row.
pub async fn process_row(
    ctx: &RowContext,
    config: &EnrichmentConfig,
    provider: &dyn EnrichmentProvider,
) -> RowResult {
    debug!("Processing row {}", ctx.row_index);
    let calls = plan_row(ctx, config);

    if config.combine_outputs {
        match calls.into_iter().next() {
            Some(call) => process_combined(ctx.row_index, call, config, provider).await,
            None => RowResult::failed(ctx.row_index, "No provider call planned for row"),
        }
    } else {
        process_per_output(ctx.row_index, calls, config, provider).await
    }
}

async fn process_combined(
    row_index: usize,
    call: PlannedCall,
    config: &EnrichmentConfig,
    provider: &dyn EnrichmentProvider,
) -> RowResult {
    let response = match provider.process_prompt(&call.prompt, &call.options).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Row {} failed: {}", row_index, e);
            return RowResult::failed(row_index, e.to_string());
        }
    };

    let Some(reply) = response.structured_data.as_ref().and_then(Value::as_object) else {
        let reason = response
            .error
            .clone()
            .unwrap_or_else(|| "Combined response carried no structured object".to_string());
        warn!("Row {} failed: {}", row_index, reason);
        return RowResult::failed(row_index, reason);
    };

    // The provider flagged a schema violation somewhere in the reply; pin it on the
    // outputs whose part of the reply is at fault.
    let mismatch = response.error.is_some();
    let combined = call.options.response_schema.as_ref();

    let outputs = config
        .outputs
        .iter()
        .map(|spec| {
            let response = match reply.get(&spec.name) {
                None => CanonicalResponse::failure(format!(
                    "Combined response has no '{}' entry",
                    spec.name
                )),
                Some(value) => {
                    let mut response = normalize_structured(
                        value,
                        spec.output_type,
                        spec.output_cardinality,
                        &spec.output_categories,
                    );
                    if mismatch && response.error.is_none() {
                        if let Some(sub) = combined.and_then(|s| schema::property(s, &spec.name)) {
                            if let Err(detail) = schema::check(sub, value) {
                                response.error =
                                    Some(format!("Response did not match schema: {}", detail));
                            }
                        }
                    }
                    response
                }
            };
            OutputResult::new(spec, response)
        })
        .collect();

    RowResult {
        row_index,
        outputs,
        error: None,
    }
}

async fn process_per_output(
    row_index: usize,
    calls: Vec<PlannedCall>,
    config: &EnrichmentConfig,
    provider: &dyn EnrichmentProvider,
) -> RowResult {
    let mut outputs = Vec::with_capacity(calls.len());

    for (spec, call) in config.outputs.iter().zip(calls) {
        match provider.process_prompt(&call.prompt, &call.options).await {
            Ok(response) => outputs.push(OutputResult::new(spec, response)),
            Err(e) => warn!("Row {} output '{}' skipped: {}", row_index, spec.name, e),
        }
    }

    RowResult {
        row_index,
        outputs,
        error: None,
    }
}
