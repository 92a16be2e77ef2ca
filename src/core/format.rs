//! Shapes row results back into a table.

use super::model::{
    CanonicalResponse, EnrichmentConfig, EnrichmentResult, OutputCardinality, OutputFormat,
    OutputResult, ResponseValue, RowError, RowResult,
};
use super::normalize::number_value;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

const STRUCTURED_PREVIEW_CHARS: usize = 80;

/// Builds the final table for a run.
///
/// `row_results` must be ordered by ascending row index. Original rows are aligned to
/// the header width: short rows are padded with empty cells, cells past the last
/// header are dropped.
pub fn format(
    row_results: &[RowResult],
    config: &EnrichmentConfig,
    headers: &[String],
    rows: &[Vec<String>],
) -> EnrichmentResult {
    let reasoning_outputs = reasoning_outputs(row_results, config);

    let ragged = rows.iter().filter(|row| row.len() > headers.len()).count();
    if ragged > 0 {
        warn!(
            "{} row(s) have more cells than the {} headers; extra cells are dropped",
            ragged,
            headers.len()
        );
    }

    let mut new_headers = headers.to_vec();
    new_headers.extend(config.outputs.iter().map(|o| o.name.clone()));
    new_headers.extend(reasoning_outputs.iter().map(|name| reasoning_column(name)));

    let new_rows = match config.output_format {
        OutputFormat::NewColumns => wide_rows(row_results, config, &reasoning_outputs, headers, rows),
        OutputFormat::NewRows => long_rows(row_results, config, &reasoning_outputs, headers, rows),
    };

    let errors = row_results
        .iter()
        .filter_map(|r| {
            r.error.as_ref().map(|error| RowError {
                row_index: r.row_index,
                error: error.clone(),
            })
        })
        .collect();

    EnrichmentResult {
        new_headers: Some(new_headers),
        new_rows: Some(new_rows),
        processed_row_count: row_results.len(),
        errors,
    }
}

/// Header of the column holding an output's reasoning.
pub fn reasoning_column(output_name: &str) -> String {
    format!("{}_reasoning", output_name)
}

/// Outputs, in config order, that ask for reasoning and produced it in at least one row.
fn reasoning_outputs(row_results: &[RowResult], config: &EnrichmentConfig) -> Vec<String> {
    config
        .outputs
        .iter()
        .filter(|spec| spec.include_reasoning)
        .filter(|spec| {
            row_results.iter().any(|row| {
                row.output(&spec.name)
                    .and_then(|o| reasoning(&o.response))
                    .is_some()
            })
        })
        .map(|spec| spec.name.clone())
        .collect()
}

fn wide_rows(
    row_results: &[RowResult],
    config: &EnrichmentConfig,
    reasoning_outputs: &[String],
    headers: &[String],
    rows: &[Vec<String>],
) -> Vec<Vec<String>> {
    let added = config.outputs.len() + reasoning_outputs.len();
    let by_index: HashMap<usize, &RowResult> = row_results
        .iter()
        .filter(|r| r.error.is_none())
        .map(|r| (r.row_index, r))
        .collect();

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let mut cells = original_cells(row, headers.len());
            match by_index.get(&index) {
                Some(result) => {
                    for spec in &config.outputs {
                        cells.push(result.output(&spec.name).map(|o| display(&o.response)).unwrap_or_default());
                    }
                    cells.extend(reasoning_cells(result, reasoning_outputs));
                }
                None => cells.extend(std::iter::repeat(String::new()).take(added)),
            }
            cells
        })
        .collect()
}

fn long_rows(
    row_results: &[RowResult],
    config: &EnrichmentConfig,
    reasoning_outputs: &[String],
    headers: &[String],
    rows: &[Vec<String>],
) -> Vec<Vec<String>> {
    let mut out = Vec::new();

    for result in row_results.iter().filter(|r| r.error.is_none()) {
        let Some(row) = rows.get(result.row_index) else {
            continue;
        };
        let base = original_cells(row, headers.len());
        let reasoning = reasoning_cells(result, reasoning_outputs);

        let sub_rows = result
            .outputs
            .iter()
            .filter_map(fanned_out)
            .map(|items| items.len())
            .max()
            .unwrap_or(1)
            .max(1);

        for i in 0..sub_rows {
            let mut cells = base.clone();
            for spec in &config.outputs {
                let cell = match result.output(&spec.name) {
                    None => String::new(),
                    Some(output) => match fanned_out(output) {
                        Some(items) => items.get(i).map(item_display).unwrap_or_default(),
                        None => display(&output.response),
                    },
                };
                cells.push(cell);
            }
            cells.extend(reasoning.iter().cloned());
            out.push(cells);
        }
    }

    out
}

/// List values of a multiple-cardinality output that fans out into sub-rows.
fn fanned_out(output: &OutputResult) -> Option<Vec<Value>> {
    if output.output_cardinality != OutputCardinality::Multiple || output.response.error.is_some() {
        return None;
    }
    output.response.fan_out_values()
}

fn reasoning_cells(result: &RowResult, reasoning_outputs: &[String]) -> Vec<String> {
    reasoning_outputs
        .iter()
        .map(|name| {
            result
                .output(name)
                .and_then(|o| reasoning(&o.response))
                .unwrap_or_default()
        })
        .collect()
}

/// Original cells aligned to the header width.
fn original_cells(row: &[String], width: usize) -> Vec<String> {
    let mut cells: Vec<String> = row.iter().take(width).cloned().collect();
    cells.resize(width, String::new());
    cells
}

/// Reasoning supplied directly or nested in the structured payload.
pub fn reasoning(response: &CanonicalResponse) -> Option<String> {
    response
        .reasoning
        .clone()
        .or_else(|| {
            response
                .structured_data
                .as_ref()?
                .get("reasoning")?
                .as_str()
                .map(str::to_string)
        })
        .filter(|r| !r.trim().is_empty())
}

fn item_display(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => tidy_number(other).to_string(),
    }
}

/// Numbers rendered the way a single `number` cell is.
fn tidy_number(item: &Value) -> Value {
    match item {
        Value::Number(n) if n.is_f64() => n.as_f64().map_or_else(|| item.clone(), number_value),
        _ => item.clone(),
    }
}

/// Renders a response as a single cell.
///
/// Earlier branches win even when later fields are populated: error, category, text,
/// items, structured data, number, categories, url, date.
pub fn display(response: &CanonicalResponse) -> String {
    if let Some(error) = &response.error {
        return format!("Error: {}", error);
    }

    let value = response.value.as_ref();
    match value {
        Some(ResponseValue::Category(category)) => return category.clone(),
        Some(ResponseValue::Text(text)) => return text.clone(),
        Some(ResponseValue::Items(items)) => {
            let items: Vec<Value> = items.iter().map(tidy_number).collect();
            return serde_json::to_string(&items).unwrap_or_default();
        }
        _ => {}
    }

    if let Some(data) = &response.structured_data {
        return structured_display(data);
    }

    match value {
        Some(ResponseValue::Number(n)) => n.to_string(),
        Some(ResponseValue::Categories(names)) => names.join(", "),
        Some(ResponseValue::Url(s)) | Some(ResponseValue::Date(s)) => s.clone(),
        Some(ResponseValue::Category(_) | ResponseValue::Text(_) | ResponseValue::Items(_))
        | None => String::new(),
    }
}

fn structured_display(data: &Value) -> String {
    if let Some(text @ Value::Array(_)) = data.get("text") {
        return text.to_string();
    }
    if let Some(tasks @ Value::Array(_)) = data.get("tasks") {
        return tasks.to_string();
    }
    if let Some(response) = data.get("response") {
        return item_display(response);
    }

    let json = data.to_string();
    if json.chars().count() > STRUCTURED_PREVIEW_CHARS {
        let head: String = json.chars().take(STRUCTURED_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        json
    }
}
