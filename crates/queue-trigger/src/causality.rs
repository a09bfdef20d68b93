//! Causality stamping for messages produced by function invocations.
//!
//! A producing invocation writes its id into the reserved top-level
//! [`PARENT_ID_FIELD`] of every structured payload it enqueues. When the
//! message later triggers another invocation, the id is read back so the two
//! executions can be linked. Causality is best-effort: a body that is not a
//! JSON object, or carries a malformed field, simply has no parent.

use crate::message::{InvocationId, QueueMessage};
use crate::serializer::PayloadSerializer;
use serde_json::{Map, Value};
use tracing::debug;

/// Reserved payload field carrying the producing invocation id
pub const PARENT_ID_FIELD: &str = "parentId";

/// Stamp `payload` with the producing invocation id.
///
/// Overwrites any existing value. Does nothing when there is no invocation,
/// so top-level producers emit unstamped payloads.
pub fn stamp(
    serializer: &dyn PayloadSerializer,
    payload: &mut Map<String, Value>,
    invocation_id: Option<&InvocationId>,
) {
    if let Some(id) = invocation_id {
        serializer.stamp_field(payload, PARENT_ID_FIELD, id);
    }
}

/// Read the causality parent from a delivered message
pub fn extract_parent(message: &QueueMessage) -> Option<InvocationId> {
    extract_parent_from_text(message.as_text())
}

/// Read the causality parent from raw message text
pub fn extract_parent_from_text(text: &str) -> Option<InvocationId> {
    // Cheap pre-check so plain-text bodies skip the JSON parser.
    if !text.trim_start().starts_with('{') {
        return None;
    }

    let payload: Map<String, Value> = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Message body is not a JSON object, no causality parent");
            return None;
        }
    };

    match payload.get(PARENT_ID_FIELD) {
        None => None,
        Some(Value::String(id)) => match id.parse::<InvocationId>() {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "Ignoring empty causality parent");
                None
            }
        },
        Some(other) => {
            debug!(value = %other, "Ignoring non-string causality parent");
            None
        }
    }
}

#[cfg(test)]
#[path = "causality_tests.rs"]
mod tests;
