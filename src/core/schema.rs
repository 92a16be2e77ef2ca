//! JSON schemas describing the reply shape expected from a provider.
//!
//! Object schemas always list every property as required and forbid additional
//! properties, so a conforming reply can be read field by field.

use super::model::{OutputCardinality, OutputSpec, OutputType};
use serde_json::{json, Map, Value};

/// Schema for a single output or for all outputs of a row at once.
///
/// Returns `None` in per-output mode for single-cardinality outputs, where the reply is
/// free text handled by the normalizer.
pub fn build_schema(outputs: &[OutputSpec], combined: bool) -> Option<Value> {
    if combined {
        return Some(combined_schema(outputs));
    }
    match outputs {
        [single] => output_schema(single),
        _ => Some(combined_schema(outputs)),
    }
}

/// Schema for a per-output call. Only multiple-cardinality outputs get one.
pub fn output_schema(spec: &OutputSpec) -> Option<Value> {
    if spec.output_cardinality == OutputCardinality::Single {
        return None;
    }
    let schema = match spec.output_type {
        OutputType::Category => json!({
            "type": "array",
            "items": category_value(spec),
        }),
        OutputType::Number => json!({
            "type": "array",
            "items": { "type": "number" },
        }),
        // Some providers reject a bare top-level array of strings.
        OutputType::Text | OutputType::Url | OutputType::Date => object(with_reasoning(
            spec,
            (
                "items",
                json!({ "type": "array", "items": { "type": "string" } }),
            ),
        )),
    };
    Some(schema)
}

/// One object keyed by output name; each property requires `reasoning` and a typed field.
pub fn combined_schema(outputs: &[OutputSpec]) -> Value {
    let properties = outputs
        .iter()
        .map(|spec| (spec.name.as_str(), combined_property(spec)))
        .collect();
    object(properties)
}

fn combined_property(spec: &OutputSpec) -> Value {
    let multiple = spec.output_cardinality == OutputCardinality::Multiple;
    let (field, mut value) = match (spec.output_type, multiple) {
        (OutputType::Category, false) => ("category", category_value(spec)),
        (OutputType::Category, true) => (
            "items",
            json!({ "type": "array", "items": category_value(spec) }),
        ),
        (OutputType::Number, false) => ("number", json!({ "type": "number" })),
        (OutputType::Number, true) => (
            "items",
            json!({ "type": "array", "items": { "type": "number" } }),
        ),
        (OutputType::Text, false) => ("text", json!({ "type": "string" })),
        (OutputType::Url, false) => ("url", json!({ "type": "string" })),
        (OutputType::Date, false) => (
            "date",
            json!({ "type": "string", "description": "Date formatted as YYYY-MM-DD" }),
        ),
        (OutputType::Text | OutputType::Url | OutputType::Date, true) => (
            "items",
            json!({ "type": "array", "items": { "type": "string" } }),
        ),
    };

    if let Some(obj) = value.as_object_mut() {
        if !obj.contains_key("description") {
            obj.insert(
                "description".to_string(),
                Value::String(format!(
                    "{} output for {}",
                    capitalize(spec.output_type.as_str()),
                    spec.name
                )),
            );
        }
    }

    object(with_reasoning(spec, (field, value)))
}

/// `reasoning` followed by the value field, or the value field alone when the output
/// opts out of reasoning.
fn with_reasoning<'a>(spec: &OutputSpec, field: (&'a str, Value)) -> Vec<(&'a str, Value)> {
    if spec.include_reasoning {
        vec![("reasoning", reasoning_property()), field]
    } else {
        vec![field]
    }
}

fn category_value(spec: &OutputSpec) -> Value {
    let mut value = json!({ "type": "string" });
    if spec.output_categories.is_empty() {
        return value;
    }
    value["enum"] = json!(spec.category_names());
    let described: Vec<String> = spec
        .output_categories
        .iter()
        .map(|c| match &c.description {
            Some(d) if !d.is_empty() => format!("{}: {}", c.name, d),
            _ => c.name.clone(),
        })
        .collect();
    value["description"] = Value::String(format!("One of: {}", described.join("; ")));
    value
}

fn reasoning_property() -> Value {
    json!({
        "type": "string",
        "description": "Short explanation of how the value was chosen",
    })
}

fn object(properties: Vec<(&str, Value)>) -> Value {
    let required: Vec<Value> = properties
        .iter()
        .map(|(name, _)| Value::String(name.to_string()))
        .collect();
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Checks `instance` against `schema`, returning the first violation.
pub fn check(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator = jsonschema::validator_for(schema).map_err(|e| format!("invalid schema: {}", e))?;
    validator.validate(instance).map_err(|e| e.to_string())
}

/// Sub-schema of one output inside a combined schema.
pub fn property<'a>(combined: &'a Value, name: &str) -> Option<&'a Value> {
    combined.get("properties")?.get(name)
}
