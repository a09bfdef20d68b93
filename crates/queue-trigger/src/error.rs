//! Error types and failure classification for queue operations.

use thiserror::Error;

/// Error codes reported by the storage queue service.
pub mod codes {
    pub const QUEUE_NOT_FOUND: &str = "QueueNotFound";
    pub const MESSAGE_NOT_FOUND: &str = "MessageNotFound";
    pub const QUEUE_ALREADY_EXISTS: &str = "QueueAlreadyExists";
    pub const QUEUE_BEING_DELETED: &str = "QueueBeingDeleted";
    pub const QUEUE_DISABLED: &str = "QueueDisabled";
    pub const POP_RECEIPT_MISMATCH: &str = "PopReceiptMismatch";
    pub const CONDITION_NOT_MET: &str = "ConditionNotMet";
    pub const INTERNAL_ERROR: &str = "InternalError";
    pub const SERVER_BUSY: &str = "ServerBusy";
}

/// Classified category of a failed queue operation
///
/// Callers use this to pick a retry policy without inspecting raw status
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// 5xx response, transient and safe to retry with backoff
    ServerError,
    /// 404 with `QueueNotFound`
    NotFoundQueue,
    /// 404 with `MessageNotFound`, the message was already consumed
    NotFoundMessage,
    /// 409, the queue is being deleted or is disabled
    Conflict,
    /// 412 or pop receipt mismatch, another consumer owns the message
    PreconditionFailed,
    /// Operation cancelled by the caller
    Cancelled,
    /// Undecodable or malformed payload
    Payload,
    /// Anything not covered above
    Other,
}

impl FailureKind {
    /// Check if a failure of this kind is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerError)
    }
}

/// A failed response from the queue service: HTTP-like status plus an
/// optional service error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status {status} ({}): {message}", .error_code.as_deref().unwrap_or("no error code"))]
pub struct ServiceFailure {
    pub status: u16,
    pub error_code: Option<String>,
    pub message: String,
}

impl ServiceFailure {
    /// Create a failure from a status, error code and message
    pub fn new(status: u16, error_code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: error_code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn queue_not_found(queue_name: &str) -> Self {
        Self::new(
            404,
            Some(codes::QUEUE_NOT_FOUND),
            format!("The specified queue '{}' does not exist", queue_name),
        )
    }

    pub fn message_not_found(message_id: &str) -> Self {
        Self::new(
            404,
            Some(codes::MESSAGE_NOT_FOUND),
            format!("The specified message '{}' does not exist", message_id),
        )
    }

    pub fn queue_already_exists(queue_name: &str) -> Self {
        Self::new(
            409,
            Some(codes::QUEUE_ALREADY_EXISTS),
            format!("The specified queue '{}' already exists", queue_name),
        )
    }

    pub fn queue_being_deleted(queue_name: &str) -> Self {
        Self::new(
            409,
            Some(codes::QUEUE_BEING_DELETED),
            format!("The specified queue '{}' is being deleted", queue_name),
        )
    }

    pub fn pop_receipt_mismatch(message_id: &str) -> Self {
        Self::new(
            400,
            Some(codes::POP_RECEIPT_MISMATCH),
            format!(
                "The pop receipt for message '{}' does not match the current lease",
                message_id
            ),
        )
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(412, Some(codes::CONDITION_NOT_MET), message)
    }

    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, Some(codes::INTERNAL_ERROR), message)
    }

    fn has_code(&self, code: &str) -> bool {
        self.error_code.as_deref() == Some(code)
    }

    /// 5xx responses
    pub fn is_server_side_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// 404 Not Found with the error code `QueueNotFound`
    pub fn is_not_found_queue_not_found(&self) -> bool {
        self.status == 404 && self.has_code(codes::QUEUE_NOT_FOUND)
    }

    /// 404 Not Found with the error code `MessageNotFound` or `QueueNotFound`
    pub fn is_not_found_message_or_queue_not_found(&self) -> bool {
        self.status == 404
            && (self.has_code(codes::MESSAGE_NOT_FOUND) || self.has_code(codes::QUEUE_NOT_FOUND))
    }

    /// 409 Conflict with the error code `QueueBeingDeleted` or `QueueDisabled`
    pub fn is_conflict_queue_being_deleted_or_disabled(&self) -> bool {
        self.status == 409
            && (self.has_code(codes::QUEUE_BEING_DELETED) || self.has_code(codes::QUEUE_DISABLED))
    }

    /// 409 Conflict with the error code `QueueAlreadyExists`
    pub fn is_conflict_queue_already_exists(&self) -> bool {
        self.status == 409 && self.has_code(codes::QUEUE_ALREADY_EXISTS)
    }

    /// 400 Bad Request with the error code `PopReceiptMismatch`
    pub fn is_bad_request_pop_receipt_mismatch(&self) -> bool {
        self.status == 400 && self.has_code(codes::POP_RECEIPT_MISMATCH)
    }

    /// Classify this failure
    pub fn kind(&self) -> FailureKind {
        if self.is_server_side_error() {
            FailureKind::ServerError
        } else if self.is_not_found_queue_not_found() {
            FailureKind::NotFoundQueue
        } else if self.status == 404 && self.has_code(codes::MESSAGE_NOT_FOUND) {
            FailureKind::NotFoundMessage
        } else if self.is_conflict_queue_being_deleted_or_disabled() {
            FailureKind::Conflict
        } else if self.status == 412 || self.is_bad_request_pop_receipt_mismatch() {
            FailureKind::PreconditionFailed
        } else {
            FailureKind::Other
        }
    }
}

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue service request failed: {0}")]
    Service(#[from] ServiceFailure),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Classify the error for retry decisions
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Service(failure) => failure.kind(),
            Self::Cancelled => FailureKind::Cancelled,
            Self::SerializationError(_) => FailureKind::Payload,
            Self::ValidationError(_) => FailureKind::Other,
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// The underlying service failure, if any
    pub fn service_failure(&self) -> Option<&ServiceFailure> {
        match self {
            Self::Service(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Errors during message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Message body is not valid Base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Structured payload must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
