//! Double-brace template rendering for provider authorization URLs.
//!
//! Templates look like `https://provider/authorize?shop={{ shopDomain }}`.
//! Rendering never fails: unknown keys produce the empty string and a
//! template with no placeholders passes through untouched. Values are
//! inserted raw; query-encoding is the caller's job because many providers
//! expect path segments or full host names here.

use serde_json::Value;

use crate::schema::FormValues;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitute `{{ key }}` placeholders with entries from `values`.
pub fn render(template: &str, values: &FormValues) -> String {
    if !template.contains(OPEN) {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => {
                let key = after_open[..end].trim();
                out.push_str(&lookup(values, key));
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                // Unterminated placeholder. Keep the tail as written.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup(values: &FormValues, key: &str) -> String {
    match values.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
