//! Response disambiguation.
//!
//! A 2xx answer from the API can mean success, rejection, or "nothing here"
//! depending on its shape. [`disambiguate`] parses the body once and
//! classifies it into a closed [`Outcome`] before any field is extracted.

use crate::identity::Identifier;
use serde_json::{Map, Value};

/// Diagnostic for an empty array answer.
pub const REJECTED_MESSAGE: &str =
    "endpoint unavailable or rejected the request (empty array response)";

/// Classification of a 2xx body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The object exists under this identifier.
    Identifier(Identifier),
    /// Empty body: nothing to report.
    Removed,
    /// The appliance rejected the request.
    ValidationError(Vec<String>),
    /// No known success or failure shape.
    UnrecognizedShape,
}

/// Classify a 2xx body.
///
/// Checks, in order: empty body, array, `"result": "failed"` object, then an
/// identifier under `uuid`, `id`, `result`, or `<envelope>.uuid`.
///
/// ```
/// use opnsense::response::{Outcome, disambiguate};
/// use opnsense::Identifier;
///
/// assert_eq!(
///     disambiguate("{\"uuid\":\"1234-5678\"}", "rule"),
///     Outcome::Identifier(Identifier::new("1234-5678"))
/// );
/// assert!(matches!(disambiguate("[]", "rule"), Outcome::ValidationError(_)));
/// assert_eq!(disambiguate("  ", "rule"), Outcome::Removed);
/// ```
#[must_use]
pub fn disambiguate(body: &str, envelope: &str) -> Outcome {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Outcome::Removed;
    }

    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Vec<Value>>(trimmed) {
            Ok(items) if items.is_empty() => {
                Outcome::ValidationError(vec![REJECTED_MESSAGE.to_string()])
            }
            Ok(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                if messages.is_empty() {
                    Outcome::ValidationError(vec![trimmed.to_string()])
                } else {
                    Outcome::ValidationError(messages)
                }
            }
            Err(_) => Outcome::UnrecognizedShape,
        };
    }

    let object = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => object,
        _ => return Outcome::UnrecognizedShape,
    };

    if let Some(messages) = validation_failure(&object) {
        return Outcome::ValidationError(if messages.is_empty() {
            vec![trimmed.to_string()]
        } else {
            messages
        });
    }

    find_identifier(&object, envelope).map_or(Outcome::UnrecognizedShape, Outcome::Identifier)
}

/// Field messages of a `{"result": "failed", "validations": {...}}` object.
///
/// Returns `None` when the object does not report failure. Validation values
/// may be a single string or a list of strings.
#[must_use]
pub fn validation_failure(object: &Map<String, Value>) -> Option<Vec<String>> {
    if object.get("result").and_then(Value::as_str) != Some("failed") {
        return None;
    }

    let mut messages = Vec::new();
    if let Some(Value::Object(validations)) = object.get("validations") {
        for (field, detail) in validations {
            match detail {
                Value::String(message) => messages.push(format!("{field}: {message}")),
                Value::Array(items) => messages.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|message| format!("{field}: {message}")),
                ),
                other => messages.push(format!("{field}: {other}")),
            }
        }
    }
    Some(messages)
}

fn find_identifier(object: &Map<String, Value>, envelope: &str) -> Option<Identifier> {
    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(Identifier::new)
    };

    non_empty(object.get("uuid"))
        .or_else(|| non_empty(object.get("id")))
        .or_else(|| non_empty(object.get("result")))
        .or_else(|| non_empty(object.get(envelope).and_then(|inner| inner.get("uuid"))))
}
