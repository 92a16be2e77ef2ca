//! Reads enrichment presets from JSON, YAML or TypeScript files.

use super::model::EnrichmentConfig;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static EXPORT_CONST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+const\s+(\w+)(?:\s*:\s*[\w.<>]+)?\s*=\s*\{").expect("export pattern is valid")
});
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[\]}])").expect("trailing comma pattern is valid"));

/// Loads and validates a preset; the format follows the file extension.
pub fn load_preset(path: &Path) -> Result<EnrichmentConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read preset {}: {}", path.display(), e))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let config = match ext.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        "ts" | "js" => parse_ts_preset(&content),
        other => Err(format!("Unsupported preset format '{}'", other)),
    }
    .map_err(|e| format!("Invalid preset {}: {}", path.display(), e))?;

    config
        .validate()
        .map_err(|e| format!("Invalid preset {}: {}", path.display(), e))?;
    Ok(config)
}

/// Extracts the first `export const name = { ... }` object literal and parses it as JSON.
pub fn parse_ts_preset(content: &str) -> Result<EnrichmentConfig, String> {
    let m = EXPORT_CONST
        .captures(content)
        .ok_or("No `export const <name> = {` assignment found")?;
    let name = m.get(1).map(|g| g.as_str()).unwrap_or("");
    let start = m.get(0).map(|g| g.end() - 1).unwrap_or(0);

    let literal = object_literal(&content[start..])
        .ok_or_else(|| format!("Unbalanced braces in object literal '{}'", name))?;
    let cleaned = TRAILING_COMMA.replace_all(literal, "$1");

    serde_json::from_str(&cleaned).map_err(|e| format!("Object literal '{}' is not JSON: {}", name, e))
}

/// Returns the balanced `{ ... }` block at the start of `text`, skipping braces in strings.
fn object_literal(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::OutputFormat;
    use std::io::Write;

    const TS: &str = r#"
import { AIEnrichmentBlockConfig } from "../types";

export const tasksConfig: AIEnrichmentBlockConfig = {
  "integrationName": "myOpenAI",
  "model": "gpt-4o-mini",
  "outputFormat": "newRows",
  "contextColumns": ["Occupation"],
  "outputs": [
    {
      "name": "Tasks",
      "prompt": "List tasks for {{Occupation}} (use {braces} freely)",
      "outputType": "text",
      "outputCardinality": "multiple",
    },
  ],
};
"#;

    #[test]
    fn parses_typescript_object_literal() {
        let config = parse_ts_preset(TS).unwrap();
        assert_eq!(config.integration_name, "myOpenAI");
        assert_eq!(config.output_format, OutputFormat::NewRows);
        assert_eq!(config.outputs.len(), 1);
        assert!(config.outputs[0].prompt.contains("{braces}"));
    }

    #[test]
    fn missing_export_is_an_error() {
        assert!(parse_ts_preset("const x = {}").is_err());
        assert!(parse_ts_preset("export const x = { \"a\": 1").is_err());
    }

    #[test]
    fn loads_json_and_yaml_files() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            json,
            r#"{{"integrationName":"a","model":"m","outputs":[{{"name":"o","prompt":"p","outputType":"text"}}]}}"#
        )
        .unwrap();
        assert_eq!(load_preset(json.path()).unwrap().model, "m");

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            yaml,
            "integrationName: a\nmodel: m2\nmode: full\noutputs:\n  - name: o\n    prompt: p\n    outputType: number\n"
        )
        .unwrap();
        assert_eq!(load_preset(yaml.path()).unwrap().model, "m2");
    }

    #[test]
    fn invalid_preset_is_rejected() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"integrationName":"a","model":"m","outputs":[]}}"#).unwrap();
        assert!(load_preset(json.path()).is_err());
    }
}
