use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::macros::datetime;

use super::*;

fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other:?}"),
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Draft {
    title: String,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

// =============================================================================
// to_fields / from_fields
// =============================================================================

#[test]
fn typed_round_trip_preserves_instants() {
    let draft = Draft {
        title: "hello".into(),
        updated_at: datetime!(2025-06-01 12:30:00 UTC),
    };
    let map = to_fields(&draft).unwrap();
    // Timestamps live in the map as plain strings.
    assert!(map["updated_at"].is_string());
    let back: Draft = from_fields(&map).unwrap();
    assert_eq!(back, draft);
}

#[test]
fn to_fields_rejects_scalar() {
    let err = to_fields(&42).unwrap_err();
    assert!(matches!(err, FieldsError::NotAnObject("number")));
}

#[test]
fn to_fields_rejects_array() {
    let err = to_fields(&vec![1, 2, 3]).unwrap_err();
    assert!(matches!(err, FieldsError::NotAnObject("array")));
}

#[test]
fn from_fields_missing_key_errors() {
    let map = fields(json!({"title": "only"}));
    assert!(from_fields::<Draft>(&map).is_err());
}

// =============================================================================
// shallow_merge
// =============================================================================

#[test]
fn overlay_keys_win() {
    let base = fields(json!({"name": "", "age": 5}));
    let overlay = fields(json!({"name": "Saved"}));
    let merged = shallow_merge(&base, overlay);
    assert_eq!(Value::Object(merged), json!({"name": "Saved", "age": 5}));
}

#[test]
fn base_only_keys_survive() {
    let base = fields(json!({"a": 1, "b": 2}));
    let merged = shallow_merge(&base, FieldMap::new());
    assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2}));
}

#[test]
fn nested_objects_are_replaced_wholesale() {
    // Top-level merge only: no deep merging of nested objects.
    let base = fields(json!({"b": {"c": "keep?", "d": "keep?"}}));
    let overlay = fields(json!({"b": {"c": "new"}}));
    let merged = shallow_merge(&base, overlay);
    assert_eq!(Value::Object(merged), json!({"b": {"c": "new"}}));
}

// =============================================================================
// deep-copy independence
// =============================================================================

#[test]
fn clone_is_an_independent_deep_copy() {
    let original = fields(json!({"profile": {"theme": "light"}, "tags": ["a"]}));
    let mut cloned = original.clone();

    match cloned.get_mut("profile") {
        Some(Value::Object(profile)) => {
            profile.insert("theme".into(), json!("dark"));
        }
        other => panic!("expected nested object, got {other:?}"),
    }
    match cloned.get_mut("tags") {
        Some(Value::Array(tags)) => tags.push(json!("b")),
        other => panic!("expected array, got {other:?}"),
    }

    assert_eq!(
        Value::Object(original),
        json!({"profile": {"theme": "light"}, "tags": ["a"]})
    );
}

// =============================================================================
// kind
// =============================================================================

#[test]
fn kind_labels() {
    assert_eq!(kind(&Value::Null), "null");
    assert_eq!(kind(&json!(true)), "boolean");
    assert_eq!(kind(&json!(1.5)), "number");
    assert_eq!(kind(&json!("s")), "string");
    assert_eq!(kind(&json!([])), "array");
    assert_eq!(kind(&json!({})), "object");
}
