//! # Queue Trigger
//!
//! Queue trigger and output binding runtime for a serverless function host.
//!
//! This library provides:
//! - A create-on-demand adapter over a durable queue service
//! - Per-invocation collectors that stamp outbound messages with the
//!   producing invocation id
//! - In-process short-circuit notifications so local listeners skip polling
//! - A trigger executor and a polling listener with poison queue handling
//!
//! ## Module Organization
//!
//! - [error] - Error types and service failure classification
//! - [message] - Message envelopes and identifiers
//! - [client] - Queue service trait and the reliability adapter
//! - [causality] - Parent invocation stamping and extraction
//! - [collector] - Outbound message collector
//! - [notifier] - Enqueue notifications for local listeners
//! - [executor] - Trigger executor
//! - [listener] - Queue polling loop
//! - [providers] - Queue service implementations

pub mod causality;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod listener;
pub mod message;
pub mod notifier;
pub mod providers;
pub mod serializer;
pub mod writer;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueClient, QueueService};
pub use collector::{to_outbound_message, CollectorError, PublishError, QueueCollector};
pub use config::QueuesOptions;
pub use error::{
    ConfigurationError, FailureKind, QueueError, SerializationError, ServiceFailure,
    ValidationError,
};
pub use executor::{
    FunctionExecutor, FunctionResult, QueueTriggerExecutor, TriggerState, TriggeredFunctionData,
};
pub use listener::{ProcessOutcome, QueueListener};
pub use message::{
    InvocationId, MessageId, OutboundMessage, OutboundValue, PopReceipt, QueueMessage, QueueName,
    QueueProperties, SendReceipt, Timestamp,
};
pub use notifier::{EnqueueListener, MessageEnqueuedWatcher};
pub use providers::{InMemoryConfig, InMemoryQueueService, ServiceOperation};
pub use serializer::{JsonSerializer, PayloadSerializer};
pub use writer::QueueWriter;
