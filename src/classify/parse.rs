// src/classify/parse.rs
//! Turning free-form model output into a validated [`ClassificationResult`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::ClassifyError;
use crate::model::ClassificationResult;

const SUMMARY_MIN_CHARS: usize = 3;
const SUMMARY_MAX_CHARS: usize = 300;

static RE_FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```(?:json)?").expect("fence open regex"));
static RE_FENCE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)```$").expect("fence close regex"));

/// Remove Markdown code-fence markers around the payload.
pub fn strip_fences(raw: &str) -> String {
    let text = RE_FENCE_OPEN.replace_all(raw.trim(), "");
    RE_FENCE_CLOSE.replace_all(text.trim(), "").into_owned()
}

/// Parse the span from the first `{` to the last `}` as JSON.
pub fn extract_json(raw: &str) -> Result<Value, ClassifyError> {
    let text = strip_fences(raw);
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ClassifyError::NoJsonObject);
    };
    if end <= start {
        return Err(ClassifyError::NoJsonObject);
    }
    Ok(serde_json::from_str(&text[start..=end])?)
}

fn field<'a>(obj: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value, ClassifyError> {
    obj.get(key).ok_or(ClassifyError::MissingField(key))
}

/// Strict schema check. Any missing or mistyped key rejects the whole object; only
/// individual summary entries are dropped silently.
pub fn validate(value: &Value) -> Result<ClassificationResult, ClassifyError> {
    let obj = value.as_object().ok_or(ClassifyError::WrongType {
        field: "<root>",
        expected: "object",
    })?;

    let is_meaningful = field(obj, "is_meaningful")?
        .as_bool()
        .ok_or(ClassifyError::WrongType {
            field: "is_meaningful",
            expected: "boolean",
        })?;
    let summary = field(obj, "summary")?
        .as_array()
        .ok_or(ClassifyError::WrongType {
            field: "summary",
            expected: "array",
        })?;
    // Must be a JSON real; an integer such as `1` is rejected.
    let confidence = Some(field(obj, "confidence")?)
        .filter(|v| v.is_f64())
        .and_then(Value::as_f64)
        .ok_or(ClassifyError::WrongType {
            field: "confidence",
            expected: "real number",
        })?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassifyError::ConfidenceOutOfRange(confidence));
    }

    Ok(ClassificationResult {
        is_meaningful,
        summary: sanitize_summary(summary),
        confidence,
    })
}

/// Keep string entries whose trimmed length is strictly inside (3, 300).
pub fn sanitize_summary(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| {
            let n = s.chars().count();
            n > SUMMARY_MIN_CHARS && n < SUMMARY_MAX_CHARS
        })
        .map(str::to_string)
        .collect()
}
