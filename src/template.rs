//! `{{key}}` token substitution.
//!
//! The only template feature is replacing `{{ key }}` (whitespace inside the
//! braces is allowed) with a value from a flat map. Tokens without a value are
//! left untouched. There are no loops, conditionals, or escaping.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::Error;

/// Replaces every `{{ key }}` in `content` for which `lookup` returns a value.
pub fn substitute<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(first_open) = rest.find("{{") {
        let Some(close) = rest[first_open + 2..].find("}}").map(|c| first_open + 2 + c) else {
            break;
        };
        // The token belongs to the innermost `{{` before the closing braces,
        // so a stray opener earlier in the text stays literal.
        let open = rest[..close].rfind("{{").unwrap_or(first_open);
        let token = &rest[open + 2..close];
        match lookup(token.trim()) {
            Some(value) => {
                out.push_str(&rest[..open]);
                out.push_str(&value);
            }
            None => out.push_str(&rest[..close + 2]),
        }
        rest = &rest[close + 2..];
    }
    out.push_str(rest);
    out
}

/// Substitutes from a string map (query parameters).
pub fn render_with_strings(content: &str, data: &HashMap<String, String>) -> String {
    substitute(content, |key| data.get(key).cloned())
}

/// Substitutes from a JSON object. Strings are inserted verbatim; other
/// values use their JSON text. A non-object `data` substitutes nothing.
pub fn render_with_value(content: &str, data: &Value) -> String {
    let Value::Object(map) = data else {
        return content.to_owned();
    };
    substitute(content, |key| {
        map.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })
}

/// Loads a template file as UTF-8.
pub(crate) async fn load(path: &Path) -> Result<String, Error> {
    Ok(tokio::fs::read_to_string(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_known_tokens_with_optional_whitespace() {
        let data = HashMap::from([("name".to_owned(), "Ada".to_owned())]);
        let out = render_with_strings("<p>{{name}} / {{ name }}</p>", &data);
        assert_eq!(out, "<p>Ada / Ada</p>");
    }

    #[test]
    fn unknown_and_unterminated_tokens_are_kept() {
        let data = HashMap::new();
        assert_eq!(render_with_strings("a {{ missing }} b", &data), "a {{ missing }} b");
        assert_eq!(render_with_strings("a {{ open", &data), "a {{ open");
    }

    #[test]
    fn stray_openers_do_not_hide_the_next_token() {
        let data = HashMap::from([("name".to_owned(), "Ada".to_owned())]);
        assert_eq!(render_with_strings("x {{ y {{name}} z", &data), "x {{ y Ada z");
        assert_eq!(render_with_strings("{{{name}}}", &data), "{Ada}");
        assert_eq!(render_with_strings("{{ a }} {{name}}", &data), "{{ a }} Ada");
    }

    #[test]
    fn json_values_are_stringified() {
        let out = render_with_value(
            "{{title}}: {{name}} ({{age}})",
            &json!({ "title": "User Page", "name": "John Doe", "age": 30 }),
        );
        assert_eq!(out, "User Page: John Doe (30)");
    }

    #[test]
    fn non_object_data_is_ignored() {
        assert_eq!(render_with_value("{{x}}", &json!([1, 2])), "{{x}}");
    }
}
