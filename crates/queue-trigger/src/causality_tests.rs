//! Tests for causality stamping.

use super::*;
use crate::serializer::JsonSerializer;
use serde_json::json;

fn object(value: Value) -> Map<String, Value> {
    JsonSerializer.serialize(&value).unwrap()
}

fn encode(payload: &Map<String, Value>) -> String {
    JsonSerializer.to_encoded_string(payload).unwrap()
}

#[test]
fn test_stamped_payload_yields_parent() {
    let id: InvocationId = "abc-123".parse().unwrap();
    let mut payload = object(json!({"value": 42}));

    stamp(&JsonSerializer, &mut payload, Some(&id));
    let text = encode(&payload);

    assert_eq!(text, r#"{"value":42,"parentId":"abc-123"}"#);
    assert_eq!(extract_parent_from_text(&text), Some(id));
}

#[test]
fn test_stamp_round_trips_for_various_payloads() {
    let payloads = [
        json!({}),
        json!({"nested": {"parentId": "inner"}}),
        json!({"list": [1, 2, 3], "flag": true}),
        json!({"parentId": "previous-owner"}),
    ];

    for value in payloads {
        let id = InvocationId::new();
        let mut payload = object(value);
        stamp(&JsonSerializer, &mut payload, Some(&id));
        assert_eq!(extract_parent_from_text(&encode(&payload)), Some(id));
    }
}

#[test]
fn test_stamp_without_invocation_is_noop() {
    let mut payload = object(json!({"value": 1}));
    stamp(&JsonSerializer, &mut payload, None);

    assert!(!payload.contains_key(PARENT_ID_FIELD));
    assert_eq!(extract_parent_from_text(&encode(&payload)), None);
}

#[test]
fn test_unstructured_bodies_have_no_parent() {
    assert_eq!(extract_parent_from_text("hello world"), None);
    assert_eq!(extract_parent_from_text(""), None);
    assert_eq!(extract_parent_from_text("[1,2,3]"), None);
    assert_eq!(extract_parent_from_text("{not json"), None);
    assert_eq!(extract_parent_from_text("aGVsbG8="), None);
}

#[test]
fn test_malformed_parent_field_is_ignored() {
    assert_eq!(extract_parent_from_text(r#"{"parentId": 17}"#), None);
    assert_eq!(extract_parent_from_text(r#"{"parentId": null}"#), None);
    assert_eq!(extract_parent_from_text(r#"{"parentId": ""}"#), None);
    assert_eq!(extract_parent_from_text(r#"{"parentId": {"id": "x"}}"#), None);
}

#[test]
fn test_serializer_rejects_non_objects() {
    assert!(JsonSerializer.serialize(&json!([1, 2])).is_err());
    assert!(JsonSerializer.serialize(&json!("text")).is_err());
    assert!(JsonSerializer.serialize(&Value::Null).is_err());
}
