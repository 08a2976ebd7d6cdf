//! Dot-path filter format over webhook payloads.
//!
//! Implements the `"jsonpath"` filter format: a dot-separated path,
//! optionally prefixed `$.`, either tested for truthiness on its own or
//! compared against a JSON literal:
//!
//! ```text
//! $.user.plan
//! user.plan == "pro"
//! attempts != 0
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FilterError;

use super::FilterEvaluator;

/// Evaluator for the `"jsonpath"` dot-path filter format.
pub struct PathEvaluator;

#[async_trait]
impl FilterEvaluator for PathEvaluator {
    fn format(&self) -> &str {
        "jsonpath"
    }

    async fn matches(&self, expression: &str, payload: &Value) -> Result<bool, FilterError> {
        let (path, comparison) = split_expression(expression)?;
        let resolved = resolve_path(payload, &path);

        match comparison {
            None => Ok(resolved.is_some_and(truthy)),
            Some((negated, literal)) => {
                let equal = resolved.unwrap_or(&Value::Null) == &literal;
                Ok(equal != negated)
            },
        }
    }
}

/// Splits `path == literal` / `path != literal` / bare `path` forms.
fn split_expression(expression: &str) -> Result<(Vec<String>, Option<(bool, Value)>), FilterError> {
    let (path_part, comparison) = if let Some((path, rhs)) = expression.split_once("==") {
        (path, Some((false, rhs)))
    } else if let Some((path, rhs)) = expression.split_once("!=") {
        (path, Some((true, rhs)))
    } else {
        (expression, None)
    };

    let path = parse_path(path_part)
        .ok_or_else(|| FilterError::invalid(expression, "empty or malformed path"))?;

    let comparison = match comparison {
        None => None,
        Some((negated, rhs)) => Some((negated, parse_literal(rhs))),
    };
    Ok((path, comparison))
}

fn parse_path(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("$.").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return None;
    }
    Some(segments)
}

/// Parses the right-hand side as a JSON literal, falling back to a bare
/// string so `plan == pro` reads naturally.
fn parse_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn resolve_path<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, key| current.get(key))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
