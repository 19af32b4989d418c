//! Parsing and validation of the judge's JSON output.
//!
//! The reasoning provider returns free text that is supposed to be a JSON
//! object of the form
//!
//! ```json
//! {"pass": true, "score": 0.93, "reason": "...", "unsupported_claims": []}
//! ```
//!
//! Nothing about that is trusted. The text is stripped of markdown fences,
//! parsed, and checked field by field; any mismatch becomes a
//! [`SchemaViolation`] which the judge treats as a failed attempt.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Result;

use super::types::GroundingResult;

/// A judge response that parsed as JSON but has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// Top-level value is not an object.
    #[error("expected a JSON object, got {got}")]
    NotAnObject { got: String },

    /// A required field is missing.
    #[error("missing field '{field}' (expected {expected})")]
    MissingField { field: String, expected: String },

    /// Field value has the wrong type.
    #[error("field '{field}' expected {expected}, got {got}: {value_preview}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
        value_preview: String,
    },

    /// Field value is out of its allowed range.
    #[error("field '{field}' {constraint}")]
    ConstraintViolated { field: String, constraint: String },
}

impl SchemaViolation {
    pub fn missing_field(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            expected: expected.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: impl Into<String>, value: &Value) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            got: value_type_name(value).to_string(),
            value_preview: truncate_preview(&value.to_string(), 100),
        }
    }

    pub fn constraint_violated(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::ConstraintViolated {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

/// Remove a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(content: &str) -> &str {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parse raw judge output into a validated [`GroundingResult`].
pub fn parse_judgment(raw: &str) -> Result<GroundingResult> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))?;
    Ok(validate_judgment(&value)?)
}

/// Check a parsed judge response against the expected shape.
///
/// Unknown extra fields are ignored.
pub fn validate_judgment(value: &Value) -> std::result::Result<GroundingResult, SchemaViolation> {
    let obj = value.as_object().ok_or_else(|| SchemaViolation::NotAnObject {
        got: value_type_name(value).to_string(),
    })?;

    let pass_value = required(obj, "pass", "boolean")?;
    let pass = pass_value
        .as_bool()
        .ok_or_else(|| SchemaViolation::type_mismatch("pass", "boolean", pass_value))?;

    let score_value = required(obj, "score", "number")?;
    let score = score_value
        .as_f64()
        .ok_or_else(|| SchemaViolation::type_mismatch("score", "number", score_value))?;
    if !(0.0..=1.0).contains(&score) {
        return Err(SchemaViolation::constraint_violated(
            "score",
            format!("must be between 0 and 1, got {}", score),
        ));
    }

    let reason_value = required(obj, "reason", "string")?;
    let reason = reason_value
        .as_str()
        .ok_or_else(|| SchemaViolation::type_mismatch("reason", "string", reason_value))?
        .to_string();

    let claims_value = required(obj, "unsupported_claims", "array of strings")?;
    let claims = claims_value.as_array().ok_or_else(|| {
        SchemaViolation::type_mismatch("unsupported_claims", "array of strings", claims_value)
    })?;
    let unsupported_claims = claims
        .iter()
        .enumerate()
        .map(|(i, claim)| {
            claim.as_str().map(str::to_string).ok_or_else(|| {
                SchemaViolation::type_mismatch(format!("unsupported_claims[{}]", i), "string", claim)
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(GroundingResult {
        pass,
        score,
        reason,
        unsupported_claims,
    })
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    expected: &str,
) -> std::result::Result<&'a Value, SchemaViolation> {
    obj.get(field)
        .ok_or_else(|| SchemaViolation::missing_field(field, expected))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate_preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
