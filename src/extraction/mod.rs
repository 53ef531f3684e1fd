//! Extraction of a single JSON object from noisy LLM output.
//!
//! Every agent runs its completion through [`extract_json_object`] and then
//! reads fields with the lenient coercion helpers below, so partial or
//! wrongly typed output degrades to defaults instead of failing the stage.
//!
//! Extraction steps, in order:
//! 1. Trim; empty text fails with [`ExtractError::Empty`].
//! 2. Remove every markdown fence marker (```` ```json ```` and ```` ``` ````).
//! 3. Locate the first `{`; none fails with [`ExtractError::NoJsonObject`].
//! 4. Scan to the matching `}` tracking depth and string literals (single or
//!    double quoted, backslash escapes honoured).
//! 5. If the text ends before the object closes, keep the remainder.
//! 6. Replace smart quotes and non-breaking spaces with ASCII.
//! 7. Parse; a syntax error is [`ExtractError::Json`].
//! 8. A non-object value is [`ExtractError::NotAnObject`].

use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum characters of raw completion echoed into logs.
pub const LOG_PREVIEW_CHARS: usize = 200;

/// Why a completion could not be turned into a JSON object.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object found")]
    NoJsonObject,

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,
}

/// Extract the first balanced JSON object from `completion`.
pub fn extract_json_object(completion: &str) -> Result<Map<String, Value>, ExtractError> {
    let trimmed = completion.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::Empty);
    }

    let unfenced = strip_code_fences(trimmed);
    let start = unfenced.find('{').ok_or(ExtractError::NoJsonObject)?;
    let candidate = balanced_object(&unfenced[start..]);
    let normalized = normalize_punctuation(candidate);

    match serde_json::from_str::<Value>(&normalized)? {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractError::NotAnObject),
    }
}

/// Remove markdown fence markers anywhere in the text.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// Return the prefix of `text` (which must start at a `{`) up to and
/// including the brace that closes it. Unclosed input is returned whole.
fn balanced_object(text: &str) -> &str {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..idx + c.len_utf8()];
                }
            }
            '"' | '\'' => quote = Some(c),
            _ => {}
        }
    }

    text
}

/// Replace curly quotes and non-breaking spaces with ASCII equivalents.
pub fn normalize_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}

/// First `LOG_PREVIEW_CHARS` characters of a completion, for diagnostics.
pub fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

// ============================================================================
// Field coercion
// ============================================================================

/// String field; `None` when missing or not a string.
pub fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// String field trimmed, empty when missing, null or not scalar.
pub fn string_or_default(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Numeric field. Accepts JSON numbers and numeric strings.
pub fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field with `default` when missing or null.
///
/// Strings `"true"/"false"/"yes"/"no"` and numbers (non-zero is true) are
/// accepted; any other value counts as truthy when non-empty.
pub fn bool_field(obj: &Map<String, Value>, key: &str, default: bool) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" | "" => false,
            _ => true,
        },
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// List of strings from an array or from prose.
///
/// Arrays keep their non-null, non-blank items in order (scalars are
/// stringified). A single string is split on newlines, then commas.
/// Returns `None` for any other JSON type.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Null => None,
                    Value::String(s) => Some(s.trim().to_string()),
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) => Some(split_prose_list(s)),
        _ => None,
    }
}

/// Split a prose list on newlines, then commas, dropping blanks and
/// leading bullet markers.
pub fn split_prose_list(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.split(','))
        .map(|part| part.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Object-typed field, empty when missing or not an object.
pub fn object_or_default(obj: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match obj.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
