//! Data types shared by every stage of the enrichment pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Whether a run touches a handful of rows or the whole table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Preview,
    Full,
}

/// Table layout of the enriched result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    /// One added column per output, one row per input row.
    #[default]
    NewColumns,
    /// One row per item of the multi-valued outputs.
    NewRows,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Text,
    Number,
    Category,
    Url,
    Date,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Text => "text",
            OutputType::Number => "number",
            OutputType::Category => "category",
            OutputType::Url => "url",
            OutputType::Date => "date",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputCardinality {
    #[default]
    Single,
    Multiple,
}

/// One allowed value of a `category` output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OutputCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A single value the model is asked to produce for every row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Column key of the output; unique within a config.
    pub name: String,
    /// Template with `{{column}}` placeholders.
    pub prompt: String,
    pub output_type: OutputType,
    #[serde(default)]
    pub output_cardinality: OutputCardinality,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_categories: Vec<OutputCategory>,
    /// Replaces the block-level context columns for this output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_columns: Option<Vec<String>>,
    /// Ask for a `reasoning` field and surface it as `<name>_reasoning`.
    #[serde(default = "default_true")]
    pub include_reasoning: bool,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, output_type: OutputType) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            output_type,
            output_cardinality: OutputCardinality::Single,
            output_categories: Vec::new(),
            context_columns: None,
            include_reasoning: true,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.output_cardinality = OutputCardinality::Multiple;
        self
    }

    pub fn categories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_categories = names.into_iter().map(OutputCategory::new).collect();
        self
    }

    pub fn without_reasoning(mut self) -> Self {
        self.include_reasoning = false;
        self
    }

    pub fn context_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_multiple(&self) -> bool {
        self.output_cardinality == OutputCardinality::Multiple
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.output_categories.iter().map(|c| c.name.as_str()).collect()
    }
}

fn default_temperature() -> f32 {
    0.2
}

fn default_preview_row_count() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Full description of one enrichment job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentConfig {
    /// Selects the provider instance from the registry.
    pub integration_name: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default = "default_preview_row_count")]
    pub preview_row_count: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_true")]
    pub combine_outputs: bool,
    #[serde(default)]
    pub context_columns: Vec<String>,
    pub outputs: Vec<OutputSpec>,
}

impl EnrichmentConfig {
    pub fn new(
        integration_name: impl Into<String>,
        model: impl Into<String>,
        outputs: Vec<OutputSpec>,
    ) -> Self {
        Self {
            integration_name: integration_name.into(),
            model: model.into(),
            temperature: default_temperature(),
            mode: RunMode::default(),
            preview_row_count: default_preview_row_count(),
            output_format: OutputFormat::default(),
            combine_outputs: true,
            context_columns: Vec::new(),
            outputs,
        }
    }

    /// Checks the invariants the pipeline relies on before any row is touched.
    pub fn validate(&self) -> Result<(), String> {
        if self.integration_name.trim().is_empty() {
            return Err("integrationName must not be empty".to_string());
        }
        if self.outputs.is_empty() {
            return Err("at least one output must be configured".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} is outside the range 0.0..=2.0",
                self.temperature
            ));
        }
        if self.mode == RunMode::Preview && self.preview_row_count == 0 {
            return Err("previewRowCount must be at least 1".to_string());
        }

        let mut seen = HashSet::new();
        for output in &self.outputs {
            if output.name.trim().is_empty() {
                return Err("output names must not be empty".to_string());
            }
            if !seen.insert(output.name.as_str()) {
                return Err(format!("duplicate output name '{}'", output.name));
            }
            if output.output_type == OutputType::Category && output.output_categories.is_empty() {
                return Err(format!(
                    "output '{}' is of type category but lists no outputCategories",
                    output.name
                ));
            }
        }
        Ok(())
    }
}

/// Values available to the templates of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub row_index: usize,
    pub headers: Vec<String>,
    pub row_data: Vec<String>,
    pub context_data: HashMap<String, String>,
}

impl RowContext {
    /// Builds the context of `row_index`, resolving `context_columns` against the headers.
    /// Names that match no header are skipped.
    pub fn new(
        row_index: usize,
        headers: &[String],
        row: &[String],
        context_columns: &[String],
    ) -> Self {
        Self {
            row_index,
            headers: headers.to_vec(),
            row_data: row.to_vec(),
            context_data: resolve_columns(headers, row, context_columns),
        }
    }

    /// The same row with its context data resolved from `context_columns` instead.
    pub fn with_context_columns(&self, context_columns: &[String]) -> Self {
        Self {
            row_index: self.row_index,
            headers: self.headers.clone(),
            row_data: self.row_data.clone(),
            context_data: resolve_columns(&self.headers, &self.row_data, context_columns),
        }
    }

    /// Value of the cell under `header`, if the header exists.
    pub fn cell(&self, header: &str) -> Option<&str> {
        let pos = self.headers.iter().position(|h| h == header)?;
        Some(self.row_data.get(pos).map(String::as_str).unwrap_or(""))
    }
}

fn resolve_columns(
    headers: &[String],
    row: &[String],
    columns: &[String],
) -> HashMap<String, String> {
    columns
        .iter()
        .filter_map(|name| {
            let pos = headers.iter().position(|h| h == name)?;
            let value = row.get(pos).cloned().unwrap_or_default();
            Some((name.clone(), value))
        })
        .collect()
}

/// Per-call options handed to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOptions {
    pub model: String,
    pub temperature: f32,
    /// `None` for a combined call: the reply object is returned as structured data.
    pub output_type: Option<OutputType>,
    pub output_cardinality: Option<OutputCardinality>,
    pub output_categories: Vec<OutputCategory>,
    pub response_schema: Option<Value>,
}

impl PromptOptions {
    /// Options for a call answering a single output.
    pub fn for_output(config: &EnrichmentConfig, spec: &OutputSpec, schema: Option<Value>) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            output_type: Some(spec.output_type),
            output_cardinality: Some(spec.output_cardinality),
            output_categories: spec.output_categories.clone(),
            response_schema: schema,
        }
    }

    /// Options for one call answering every output of a row.
    pub fn combined(config: &EnrichmentConfig, schema: Value) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            output_type: None,
            output_cardinality: None,
            output_categories: Vec::new(),
            response_schema: Some(schema),
        }
    }
}

/// The typed value carried by a normalized response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    Text(String),
    Number(f64),
    Category(String),
    Categories(Vec<String>),
    Url(String),
    Date(String),
    /// Values of a multiple-cardinality output.
    Items(Vec<Value>),
}

/// Provider reply after normalization; every provider produces this shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalResponse {
    pub value: Option<ResponseValue>,
    pub reasoning: Option<String>,
    /// Raw structured payload, kept when no typed value could be read from it.
    pub structured_data: Option<Value>,
    pub error: Option<String>,
}

impl CanonicalResponse {
    pub fn from_value(value: ResponseValue) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn structured(data: Value) -> Self {
        Self {
            structured_data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_reasoning(mut self, reasoning: Option<String>) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// List values used when a row fans out into several sub-rows.
    pub fn fan_out_values(&self) -> Option<Vec<Value>> {
        match &self.value {
            Some(ResponseValue::Items(items)) => Some(items.clone()),
            Some(ResponseValue::Categories(names)) => {
                Some(names.iter().cloned().map(Value::String).collect())
            }
            _ => None,
        }
    }
}

/// Normalized response for one output of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputResult {
    pub output_name: String,
    pub output_type: OutputType,
    pub output_cardinality: OutputCardinality,
    pub response: CanonicalResponse,
}

impl OutputResult {
    pub fn new(spec: &OutputSpec, response: CanonicalResponse) -> Self {
        Self {
            output_name: spec.name.clone(),
            output_type: spec.output_type,
            output_cardinality: spec.output_cardinality,
            response,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub row_index: usize,
    pub outputs: Vec<OutputResult>,
    /// Row-level failure; `outputs` is empty when set.
    pub error: Option<String>,
}

impl RowResult {
    pub fn failed(row_index: usize, error: impl Into<String>) -> Self {
        Self {
            row_index,
            outputs: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn output(&self, name: &str) -> Option<&OutputResult> {
        self.outputs.iter().find(|o| o.output_name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_index: usize,
    pub error: String,
}

/// Terminal artifact of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub new_headers: Option<Vec<String>>,
    pub new_rows: Option<Vec<Vec<String>>>,
    pub processed_row_count: usize,
    pub errors: Vec<RowError>,
}

impl EnrichmentResult {
    /// Position of `header` in the enriched header row.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.new_headers.as_ref()?.iter().position(|h| h == header)
    }
}
