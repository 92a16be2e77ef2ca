//! Maps raw provider replies onto [`CanonicalResponse`].

use super::model::{
    CanonicalResponse, OutputCardinality, OutputCategory, OutputType, PromptOptions,
    ResponseValue,
};
use super::schema;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d+(?:\.\d+)?|\.\d+)").expect("number pattern is valid")
});
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`\])]+"#).expect("url pattern is valid"));
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("date pattern is valid"));
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[\w-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("list marker pattern is valid")
});

/// A provider reply before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    Text(String),
    Structured(Value),
}

/// Normalizes a reply for the given output shape.
pub fn normalize(
    raw: &RawReply,
    output_type: OutputType,
    cardinality: OutputCardinality,
    categories: &[OutputCategory],
) -> CanonicalResponse {
    match raw {
        RawReply::Text(text) => normalize_text(text, output_type, cardinality, categories),
        RawReply::Structured(value) => {
            normalize_structured(value, output_type, cardinality, categories)
        }
    }
}

/// Turns the text of a provider reply into a canonical response.
///
/// When a schema was requested the reply is decoded as JSON and checked against it;
/// otherwise the textual extraction rules apply. A combined call (`output_type` is
/// `None`) yields the decoded object as `structured_data`.
pub fn from_reply(reply: &str, options: &PromptOptions) -> CanonicalResponse {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return CanonicalResponse::failure("Provider returned an empty response");
    }

    if let Some(response_schema) = &options.response_schema {
        match serde_json::from_str::<Value>(extract_json(trimmed)) {
            Ok(value) => {
                let mismatch = schema::check(response_schema, &value).err();
                let mut response = match options.output_type {
                    None => CanonicalResponse::structured(value),
                    Some(output_type) => normalize_structured(
                        &value,
                        output_type,
                        options.output_cardinality.unwrap_or_default(),
                        &options.output_categories,
                    ),
                };
                if let Some(detail) = mismatch {
                    warn!("Reply does not match the requested schema: {}", detail);
                    if response.error.is_none() {
                        response.error = Some(format!("Response did not match schema: {}", detail));
                    }
                }
                return response;
            }
            Err(e) if options.output_type.is_none() => {
                return CanonicalResponse::failure(format!("Response was not valid JSON: {}", e));
            }
            Err(e) => debug!("Structured reply expected but not decodable ({}), reading as text", e),
        }
    }

    match options.output_type {
        Some(output_type) => normalize_text(
            trimmed,
            output_type,
            options.output_cardinality.unwrap_or_default(),
            &options.output_categories,
        ),
        None => CanonicalResponse::failure("Combined call returned no structured data"),
    }
}

/// Returns the JSON body of a reply.
///
/// The first Markdown code fence wins, whatever its language tag and whatever prose
/// precedes it. Without a fence, prose around a single object or array is cut away.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(body) = FENCE.captures(text).and_then(|caps| caps.get(1)) {
        return body.as_str().trim();
    }
    if text.starts_with(['{', '[']) {
        return text;
    }
    match (text.find(['{', '[']), text.rfind(['}', ']'])) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Extraction rules for free-text replies.
pub fn normalize_text(
    text: &str,
    output_type: OutputType,
    cardinality: OutputCardinality,
    categories: &[OutputCategory],
) -> CanonicalResponse {
    let text = text.trim();
    if text.is_empty() {
        return CanonicalResponse::failure("Provider returned an empty response");
    }

    if cardinality == OutputCardinality::Multiple {
        if let Ok(value @ (Value::Array(_) | Value::Object(_))) =
            serde_json::from_str::<Value>(extract_json(text))
        {
            return normalize_structured(&value, output_type, cardinality, categories);
        }
    }

    match (output_type, cardinality) {
        (OutputType::Text, OutputCardinality::Single) => {
            CanonicalResponse::from_value(ResponseValue::Text(text.to_string()))
        }
        (OutputType::Text, OutputCardinality::Multiple) => {
            let items: Vec<Value> = text
                .lines()
                .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
                .filter(|line| !line.is_empty())
                .map(Value::String)
                .collect();
            CanonicalResponse::from_value(ResponseValue::Items(items))
        }
        (OutputType::Category, OutputCardinality::Single) => match_category(text, categories),
        (OutputType::Category, OutputCardinality::Multiple) => match_categories(text, categories),
        (OutputType::Number, cardinality) => {
            let numbers: Vec<f64> = NUMBER
                .find_iter(text)
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect();
            match (numbers.first(), cardinality) {
                (None, _) => CanonicalResponse::failure(format!("No number found in response: {}", text)),
                (Some(n), OutputCardinality::Single) => {
                    CanonicalResponse::from_value(ResponseValue::Number(*n))
                }
                (Some(_), OutputCardinality::Multiple) => {
                    CanonicalResponse::from_value(ResponseValue::Items(
                        numbers.into_iter().map(number_value).collect(),
                    ))
                }
            }
        }
        (OutputType::Url, cardinality) => {
            let urls: Vec<String> = URL
                .find_iter(text)
                .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
                .collect();
            pattern_value(urls, cardinality, ResponseValue::Url, "URL", text)
        }
        (OutputType::Date, cardinality) => {
            let dates: Vec<String> = DATE.find_iter(text).map(|m| m.as_str().to_string()).collect();
            pattern_value(dates, cardinality, ResponseValue::Date, "date", text)
        }
    }
}

/// JSON form of an extracted number; whole numbers stay integers so `3` never shows
/// up as `3.0`.
pub fn number_value(n: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < EXACT {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn pattern_value(
    found: Vec<String>,
    cardinality: OutputCardinality,
    single: fn(String) -> ResponseValue,
    what: &str,
    text: &str,
) -> CanonicalResponse {
    let mut found = found;
    if found.is_empty() {
        return CanonicalResponse::failure(format!("No {} found in response: {}", what, text));
    }
    match cardinality {
        OutputCardinality::Single => CanonicalResponse::from_value(single(found.swap_remove(0))),
        OutputCardinality::Multiple => CanonicalResponse::from_value(ResponseValue::Items(
            found.into_iter().map(Value::String).collect(),
        )),
    }
}

fn clean_label(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim()
}

fn match_category(text: &str, categories: &[OutputCategory]) -> CanonicalResponse {
    let reply = clean_label(text);
    let Some(first) = categories.first() else {
        return CanonicalResponse::from_value(ResponseValue::Category(reply.to_string()));
    };

    if let Some(exact) = categories.iter().find(|c| c.name.eq_ignore_ascii_case(reply)) {
        return CanonicalResponse::from_value(ResponseValue::Category(exact.name.clone()));
    }

    // Best effort: the longest category name mentioned as whole words in the reply, or
    // a category whose name contains the whole reply as words.
    let mentioned = categories
        .iter()
        .filter(|c| !c.name.is_empty() && contains_words(reply, &c.name))
        .max_by_key(|c| c.name.len());
    let containing = || {
        categories
            .iter()
            .find(|c| !reply.is_empty() && contains_words(&c.name, reply))
    };
    if let Some(found) = mentioned.or_else(containing) {
        return CanonicalResponse::from_value(ResponseValue::Category(found.name.clone()));
    }

    CanonicalResponse::from_value(ResponseValue::Category(first.name.clone())).with_error(format!(
        "Could not match '{}' to any configured category",
        reply
    ))
}

/// Whether `needle` occurs in `haystack`, ignoring case, bounded by non-word
/// characters or the ends of the text.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"(?i)(?:^|\W){}(?:$|\W)", regex::escape(needle));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(haystack))
}

fn match_categories(text: &str, categories: &[OutputCategory]) -> CanonicalResponse {
    let parts = text.split(',').map(clean_label).filter(|p| !p.is_empty());

    let mut names: Vec<String> = Vec::new();
    for part in parts {
        let name = if categories.is_empty() {
            Some(part.to_string())
        } else {
            categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(part))
                .map(|c| c.name.clone())
        };
        if let Some(name) = name {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    if names.is_empty() {
        return CanonicalResponse::failure(format!(
            "None of the values in '{}' match a configured category",
            text.trim()
        ));
    }
    CanonicalResponse::from_value(ResponseValue::Categories(names))
}

/// Reads the fields of a schema-shaped reply without re-parsing text.
pub fn normalize_structured(
    value: &Value,
    output_type: OutputType,
    cardinality: OutputCardinality,
    categories: &[OutputCategory],
) -> CanonicalResponse {
    match value {
        Value::Array(items) => CanonicalResponse::from_value(ResponseValue::Items(items.clone())),
        Value::Object(map) => {
            let reasoning = map
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string);
            let field = value_field(output_type, cardinality);
            let read = map
                .get(field)
                .or_else(|| fallback_field(map, output_type, cardinality))
                .and_then(|v| typed_value(v, output_type, cardinality));

            match read {
                Some(value) => CanonicalResponse::from_value(value).with_reasoning(reasoning),
                None => CanonicalResponse::structured(value.clone())
                    .with_reasoning(reasoning)
                    .with_error(format!("Structured response has no usable '{}' field", field)),
            }
        }
        Value::String(text) => normalize_text(text, output_type, cardinality, categories),
        Value::Number(n) => match (output_type, n.as_f64()) {
            (OutputType::Number, Some(n)) => CanonicalResponse::from_value(ResponseValue::Number(n)),
            _ => normalize_text(&n.to_string(), output_type, cardinality, categories),
        },
        Value::Bool(_) | Value::Null => {
            CanonicalResponse::failure(format!("Unexpected structured response: {}", value))
        }
    }
}

fn value_field(output_type: OutputType, cardinality: OutputCardinality) -> &'static str {
    match (output_type, cardinality) {
        (_, OutputCardinality::Multiple) => "items",
        (OutputType::Text, _) => "text",
        (OutputType::Number, _) => "number",
        (OutputType::Category, _) => "category",
        (OutputType::Url, _) => "url",
        (OutputType::Date, _) => "date",
    }
}

fn fallback_field<'a>(
    map: &'a serde_json::Map<String, Value>,
    output_type: OutputType,
    cardinality: OutputCardinality,
) -> Option<&'a Value> {
    match (output_type, cardinality) {
        (OutputType::Category, OutputCardinality::Multiple) => map.get("categories"),
        (_, OutputCardinality::Multiple) => None,
        _ => map.get("value"),
    }
}

fn typed_value(
    value: &Value,
    output_type: OutputType,
    cardinality: OutputCardinality,
) -> Option<ResponseValue> {
    if cardinality == OutputCardinality::Multiple {
        return match value {
            Value::Array(items) => Some(ResponseValue::Items(items.clone())),
            _ => None,
        };
    }
    match output_type {
        OutputType::Number => match value {
            Value::Number(n) => n.as_f64().map(ResponseValue::Number),
            Value::String(s) => NUMBER
                .find(s)
                .and_then(|m| m.as_str().parse().ok())
                .map(ResponseValue::Number),
            _ => None,
        },
        OutputType::Text => value.as_str().map(|s| ResponseValue::Text(s.to_string())),
        OutputType::Category => value.as_str().map(|s| ResponseValue::Category(s.to_string())),
        OutputType::Url => value.as_str().map(|s| ResponseValue::Url(s.to_string())),
        OutputType::Date => value.as_str().map(|s| ResponseValue::Date(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cats(names: &[&str]) -> Vec<OutputCategory> {
        names.iter().map(|n| OutputCategory::new(*n)).collect()
    }

    fn text(reply: &str, t: OutputType, c: OutputCardinality, categories: &[OutputCategory]) -> CanonicalResponse {
        normalize(&RawReply::Text(reply.to_string()), t, c, categories)
    }

    #[test]
    fn text_is_trimmed() {
        let r = text("  hello world \n", OutputType::Text, OutputCardinality::Single, &[]);
        assert_eq!(r.value, Some(ResponseValue::Text("hello world".into())));
        assert!(r.error.is_none());
    }

    #[test]
    fn category_matches_case_insensitively() {
        let r = text("retail.", OutputType::Category, OutputCardinality::Single, &cats(&["Retail", "Tech"]));
        assert_eq!(r.value, Some(ResponseValue::Category("Retail".into())));
        assert!(r.error.is_none());
    }

    #[test]
    fn category_falls_back_to_substring() {
        let r = text(
            "I would classify this as Tech Hardware",
            OutputType::Category,
            OutputCardinality::Single,
            &cats(&["Retail", "Tech", "Tech Hardware"]),
        );
        assert_eq!(r.value, Some(ResponseValue::Category("Tech Hardware".into())));
    }

    #[test]
    fn unmatched_category_returns_first_with_error() {
        let r = text("Agriculture", OutputType::Category, OutputCardinality::Single, &cats(&["Retail", "Tech"]));
        assert_eq!(r.value, Some(ResponseValue::Category("Retail".into())));
        assert!(r.error.unwrap().contains("Agriculture"));
    }

    #[test]
    fn short_category_names_only_match_whole_words() {
        let ab = cats(&["A", "B"]);
        let r = text("Not applicable", OutputType::Category, OutputCardinality::Single, &ab);
        assert_eq!(r.value, Some(ResponseValue::Category("A".into())));
        assert!(r.error.unwrap().contains("Not applicable"));

        let r = text("Definitely b, no doubt", OutputType::Category, OutputCardinality::Single, &ab);
        assert_eq!(r.value, Some(ResponseValue::Category("B".into())));
        assert!(r.error.is_none());

        let r = text("C++ tooling", OutputType::Category, OutputCardinality::Single, &cats(&["C", "C++"]));
        assert_eq!(r.value, Some(ResponseValue::Category("C++".into())));
    }

    #[test]
    fn multiple_categories_are_filtered() {
        let r = text("tech, Food ,retail", OutputType::Category, OutputCardinality::Multiple, &cats(&["Retail", "Tech"]));
        assert_eq!(
            r.value,
            Some(ResponseValue::Categories(vec!["Tech".into(), "Retail".into()]))
        );

        let none = text("Food", OutputType::Category, OutputCardinality::Multiple, &cats(&["Retail"]));
        assert!(none.value.is_none());
        assert!(none.error.is_some());
    }

    #[test]
    fn number_extraction() {
        let r = text("About -12.5 units, maybe 3", OutputType::Number, OutputCardinality::Single, &[]);
        assert_eq!(r.value, Some(ResponseValue::Number(-12.5)));

        let missing = text("no idea", OutputType::Number, OutputCardinality::Single, &[]);
        assert!(missing.error.unwrap().contains("No number"));
    }

    #[test]
    fn url_and_date_extraction() {
        let r = text("See https://example.com/a?b=1. Thanks", OutputType::Url, OutputCardinality::Single, &[]);
        assert_eq!(r.value, Some(ResponseValue::Url("https://example.com/a?b=1".into())));

        let d = text("Founded on 1998-09-04 in CA", OutputType::Date, OutputCardinality::Single, &[]);
        assert_eq!(d.value, Some(ResponseValue::Date("1998-09-04".into())));

        let none = text("unknown", OutputType::Date, OutputCardinality::Single, &[]);
        assert!(none.value.is_none());
        assert!(none.error.is_some());
    }

    #[test]
    fn multiple_text_splits_list_lines() {
        let r = text("- one\n2. two\n\n* three", OutputType::Text, OutputCardinality::Multiple, &[]);
        assert_eq!(
            r.value,
            Some(ResponseValue::Items(vec![json!("one"), json!("two"), json!("three")]))
        );
    }

    #[test]
    fn structured_fields_are_read_directly() {
        let raw = RawReply::Structured(json!({ "reasoning": "because", "number": 42 }));
        let r = normalize(&raw, OutputType::Number, OutputCardinality::Single, &[]);
        assert_eq!(r.value, Some(ResponseValue::Number(42.0)));
        assert_eq!(r.reasoning.as_deref(), Some("because"));
        assert!(r.structured_data.is_none());

        let raw = RawReply::Structured(json!({ "reasoning": "r", "items": ["a", "b"] }));
        let r = normalize(&raw, OutputType::Text, OutputCardinality::Multiple, &[]);
        assert_eq!(r.value, Some(ResponseValue::Items(vec![json!("a"), json!("b")])));
    }

    #[test]
    fn structured_bare_array_becomes_items() {
        let raw = RawReply::Structured(json!([1, 2]));
        let r = normalize(&raw, OutputType::Number, OutputCardinality::Multiple, &[]);
        assert_eq!(r.value, Some(ResponseValue::Items(vec![json!(1), json!(2)])));
    }

    #[test]
    fn structured_missing_field_keeps_payload() {
        let raw = RawReply::Structured(json!({ "reasoning": "r", "other": 1 }));
        let r = normalize(&raw, OutputType::Text, OutputCardinality::Single, &[]);
        assert!(r.value.is_none());
        assert!(r.structured_data.is_some());
        assert!(r.error.unwrap().contains("'text'"));
    }

    fn options(output_type: Option<OutputType>, schema: Option<Value>) -> PromptOptions {
        PromptOptions {
            model: "m".into(),
            temperature: 0.2,
            output_type,
            output_cardinality: Some(OutputCardinality::Multiple),
            output_categories: Vec::new(),
            response_schema: schema,
        }
    }

    #[test]
    fn from_reply_decodes_fenced_json() {
        let schema = json!({ "type": "array", "items": { "type": "number" } });
        let r = from_reply("```json\n[1, 2.5]\n```", &options(Some(OutputType::Number), Some(schema)));
        assert_eq!(r.value, Some(ResponseValue::Items(vec![json!(1), json!(2.5)])));
        assert!(r.error.is_none());
    }

    #[test]
    fn from_reply_flags_schema_mismatch() {
        let schema = json!({ "type": "array", "items": { "type": "number" } });
        let r = from_reply(r#"["x"]"#, &options(Some(OutputType::Number), Some(schema)));
        assert!(r.error.unwrap().starts_with("Response did not match schema"));
    }

    #[test]
    fn from_reply_combined_keeps_object() {
        let schema = json!({ "type": "object" });
        let r = from_reply(r#"{"Tag": {"reasoning": "r", "category": "A"}}"#, &options(None, Some(schema.clone())));
        assert_eq!(r.structured_data.unwrap()["Tag"]["category"], "A");

        let bad = from_reply("not json", &options(None, Some(schema)));
        assert!(bad.error.unwrap().contains("not valid JSON"));
    }

    #[test]
    fn from_reply_empty_is_error() {
        let r = from_reply("   ", &options(Some(OutputType::Text), None));
        assert!(r.error.is_some());
    }

    #[test]
    fn extract_json_handles_plain_fences() {
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(
            extract_json("Here you go:\n```\n[1, 2]\n```\nAnything else?"),
            "[1, 2]"
        );
        assert_eq!(extract_json("```JSON\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(extract_json("Result: {\"a\": [1]} done"), "{\"a\": [1]}");
        assert_eq!(extract_json("no json here"), "no json here");
    }

    #[test]
    fn whole_numbers_in_lists_stay_integers() {
        let r = text("3 and 4.5 and -2", OutputType::Number, OutputCardinality::Multiple, &[]);
        assert_eq!(
            r.value,
            Some(ResponseValue::Items(vec![json!(3), json!(4.5), json!(-2)]))
        );
    }
}
