//! Field-map helpers — typed conversion and top-level shallow merge.
//!
//! State lives as a `serde_json::Map<String, Value>` so callers can bring
//! any serde-serializable shape without the controller knowing its type.
//! The map is an owned tree: cloning it yields a deep, independent copy.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Top-level field map: the in-memory shape of form state.
pub type FieldMap = Map<String, Value>;

/// Failure converting between a typed value and a [`FieldMap`].
#[derive(Debug, thiserror::Error)]
pub enum FieldsError {
    /// The value serialized to something other than a JSON object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    /// Serde rejected the conversion.
    #[error("field conversion failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serialize any serde value into a [`FieldMap`].
///
/// # Errors
/// Fails when `value` does not serialize to a JSON object, or when serde
/// rejects it outright.
pub fn to_fields<T: Serialize>(value: &T) -> Result<FieldMap, FieldsError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(FieldsError::NotAnObject(kind(&other))),
    }
}

/// Deserialize a [`FieldMap`] into the caller's shape.
///
/// # Errors
/// Fails when the map does not match `T`.
pub fn from_fields<T: DeserializeOwned>(fields: &FieldMap) -> Result<T, FieldsError> {
    Ok(serde_json::from_value(Value::Object(fields.clone()))?)
}

/// Merge `overlay` onto `base` at the top level only. Overlay keys win;
/// nested objects are replaced wholesale, never deep-merged.
#[must_use]
pub fn shallow_merge(base: &FieldMap, overlay: FieldMap) -> FieldMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key, value);
    }
    merged
}

/// Human-readable label for a JSON value's kind, for diagnostics.
#[must_use]
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod tests;
