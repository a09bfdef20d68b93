//! Message types for queue operations including core domain identifiers.

use crate::error::{SerializationError, ValidationError};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

const MIN_QUEUE_NAME_LENGTH: usize = 3;
const MAX_QUEUE_NAME_LENGTH: usize = 63;

/// Validated, lowercase storage queue name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name, coercing to lowercase before validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into().to_lowercase();

        if name.len() < MIN_QUEUE_NAME_LENGTH || name.len() > MAX_QUEUE_NAME_LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: format!(
                    "must be {}-{} characters, got {}",
                    MIN_QUEUE_NAME_LENGTH,
                    MAX_QUEUE_NAME_LENGTH,
                    name.len()
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: format!(
                    "'{}' may only contain lowercase letters, digits and hyphens",
                    name
                ),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: format!(
                    "'{}' must start and end with a letter or digit and have no consecutive hyphens",
                    name
                ),
            });
        }

        Ok(Self(name))
    }

    /// Validate a queue name as soon as it is statically known.
    ///
    /// Names that still contain a `{...}` placeholder are only resolved at
    /// dispatch time, so validation is deferred and `Ok(None)` is returned.
    pub fn validate_static(raw: &str) -> Result<Option<Self>, ValidationError> {
        if raw.contains('{') {
            return Ok(None);
        }
        Self::new(raw).map(Some)
    }

    /// Name of the poison queue paired with this queue
    pub fn poison_queue(&self, suffix: &str) -> Result<Self, ValidationError> {
        Self::new(format!("{}{}", self.0, suffix))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Delivery identifier assigned by the queue service on send
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Lease token for the currently delivered instance of a message.
///
/// Only valid until the visibility window ends or the message is updated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopReceipt(String);

impl PopReceipt {
    /// Generate a fresh random receipt
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn new(receipt: impl Into<String>) -> Self {
        Self(receipt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PopReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a function invocation, used as the causality parent of the
/// messages it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(String);

impl InvocationId {
    /// Generate new random invocation ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvocationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "invocation_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// ISO-8601 rendering with millisecond precision, e.g. `2024-05-01T12:30:00.250Z`
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message delivered by the queue service, together with its lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: MessageId,
    pub pop_receipt: PopReceipt,
    pub body: String,
    pub dequeue_count: u32,
    pub insertion_time: Timestamp,
    pub expires_on: Option<Timestamp>,
    pub next_visible_on: Option<Timestamp>,
}

impl QueueMessage {
    /// Message body as text
    pub fn as_text(&self) -> &str {
        &self.body
    }

    /// Message body decoded from Base64
    pub fn as_bytes(&self) -> Result<Bytes, SerializationError> {
        let decoded = general_purpose::STANDARD.decode(self.body.as_bytes())?;
        Ok(Bytes::from(decoded))
    }

    /// Check if message has exceeded maximum dequeue count
    pub fn has_exceeded_max_dequeue_count(&self, max_count: u32) -> bool {
        self.dequeue_count > max_count
    }
}

/// Message text ready to be sent.
///
/// Byte payloads are Base64 framed here; the queue service only sees text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    text: String,
}

impl OutboundMessage {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            text: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// A value handed to an output binding before it becomes a message
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundValue {
    Bytes(Bytes),
    Text(String),
    Structured(serde_json::Value),
}

impl OutboundValue {
    /// Serialize any value into the structured variant
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        Ok(Self::Structured(serde_json::to_value(value)?))
    }

    /// Whether this is the structured null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Structured(serde_json::Value::Null))
    }
}

impl From<String> for OutboundValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for OutboundValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for OutboundValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for OutboundValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<serde_json::Value> for OutboundValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Acknowledgement returned by the queue service for a sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
    pub pop_receipt: PopReceipt,
    pub insertion_time: Timestamp,
    pub next_visible_on: Timestamp,
}

/// Queue metadata returned by a properties probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueProperties {
    pub approximate_message_count: usize,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
