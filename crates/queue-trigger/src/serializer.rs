//! Pluggable serializer for structured payloads.

use crate::error::SerializationError;
use crate::message::InvocationId;
use serde_json::{Map, Value};

/// Turns structured values into JSON objects and encodes them as message
/// text.
///
/// The only contract the runtime relies on is that a field written with
/// [`PayloadSerializer::stamp_field`] survives `to_encoded_string` and can be
/// read back from the encoded text as a top-level string field.
pub trait PayloadSerializer: Send + Sync {
    /// Convert a structured value into a JSON object
    fn serialize(&self, value: &Value) -> Result<Map<String, Value>, SerializationError>;

    /// Set a top-level string field on the payload
    fn stamp_field(&self, payload: &mut Map<String, Value>, field: &str, id: &InvocationId) {
        payload.insert(field.to_string(), Value::String(id.as_str().to_string()));
    }

    /// Encode the payload as message text
    fn to_encoded_string(&self, payload: &Map<String, Value>) -> Result<String, SerializationError>;
}

/// Compact JSON encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl PayloadSerializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Map<String, Value>, SerializationError> {
        match value {
            Value::Object(map) => Ok(map.clone()),
            other => Err(SerializationError::NotAnObject {
                found: json_type_name(other),
            }),
        }
    }

    fn to_encoded_string(&self, payload: &Map<String, Value>) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(payload)?)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
