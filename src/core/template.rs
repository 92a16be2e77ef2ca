//! `{{placeholder}}` substitution for prompt templates.

use super::model::RowContext;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+?)\}\}").expect("placeholder pattern is valid"));

/// Renders a template against one row.
///
/// A placeholder resolves to the row value of the header with the same name, then to
/// the context data entry with that name. Unresolved placeholders stay in the output
/// verbatim. Matching is exact and case-sensitive; surrounding spaces inside the braces
/// (`{{ name }}`) are tolerated.
pub fn render(template: &str, ctx: &RowContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let raw = &caps[1];
            lookup(raw, ctx)
                .or_else(|| lookup(raw.trim(), ctx))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn lookup(name: &str, ctx: &RowContext) -> Option<String> {
    ctx.cell(name)
        .map(str::to_string)
        .or_else(|| ctx.context_data.get(name).cloned())
}

/// Names of all placeholders in a template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps[1].trim().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx() -> RowContext {
        let headers = vec!["id".to_string(), "name".to_string(), "Job Title".to_string()];
        let row = vec!["1".to_string(), "Widget".to_string(), "Welder".to_string()];
        let mut ctx = RowContext::new(0, &headers, &row, &[]);
        ctx.context_data = HashMap::from([
            ("extra".to_string(), "ctx-value".to_string()),
            ("name".to_string(), "shadowed".to_string()),
        ]);
        ctx
    }

    #[test]
    fn substitutes_headers_before_context() {
        assert_eq!(render("{{name}} / {{extra}}", &ctx()), "Widget / ctx-value");
    }

    #[test]
    fn repeats_and_adjacent_placeholders() {
        assert_eq!(render("{{id}}{{name}}-{{id}}", &ctx()), "1Widget-1");
    }

    #[test]
    fn unresolved_placeholder_is_left_alone() {
        assert_eq!(render("{{missing}}", &ctx()), "{{missing}}");
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(render("{{Name}}", &ctx()), "{{Name}}");
    }

    #[test]
    fn headers_with_spaces_and_padded_braces() {
        assert_eq!(render("{{Job Title}} {{ id }}", &ctx()), "Welder 1");
    }

    #[test]
    fn lists_placeholders_once() {
        assert_eq!(
            placeholders("{{a}} {{ b }} {{a}}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
