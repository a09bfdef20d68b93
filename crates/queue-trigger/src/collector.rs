//! Output binding that collects messages during an invocation and publishes
//! them one by one.

use crate::causality;
use crate::client::QueueClient;
use crate::error::{QueueError, SerializationError};
use crate::message::{InvocationId, OutboundMessage, OutboundValue, QueueName, SendReceipt};
use crate::notifier::MessageEnqueuedWatcher;
use crate::serializer::{JsonSerializer, PayloadSerializer};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;

/// Errors raised while adding a value to a collector
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Cannot enqueue a null queue message instance")]
    NullMessage,

    #[error("Failed to convert value to a queue message: {0}")]
    Serialization(#[from] SerializationError),
}

/// Publishing stopped at a failed send.
///
/// Messages sent before the failure stay sent; the failed message and those
/// after it remain pending on the collector.
#[derive(Debug, Error)]
#[error("Failed to publish to queue '{queue}' after {} successful sends: {source}", .sent.len())]
pub struct PublishError {
    pub queue: QueueName,
    pub sent: Vec<SendReceipt>,
    #[source]
    pub source: QueueError,
}

/// Convert an outbound value into message text.
///
/// Structured values are serialized, stamped with `invocation_id` and
/// encoded; text is taken as-is and bytes are Base64 framed.
pub fn to_outbound_message(
    value: OutboundValue,
    invocation_id: Option<&InvocationId>,
    serializer: &dyn PayloadSerializer,
) -> Result<OutboundMessage, CollectorError> {
    match value {
        OutboundValue::Structured(serde_json::Value::Null) => Err(CollectorError::NullMessage),
        OutboundValue::Structured(value) => {
            let mut payload = serializer.serialize(&value)?;
            causality::stamp(serializer, &mut payload, invocation_id);
            Ok(OutboundMessage::from_text(
                serializer.to_encoded_string(&payload)?,
            ))
        }
        OutboundValue::Text(text) => Ok(OutboundMessage::from_text(text)),
        OutboundValue::Bytes(bytes) => Ok(OutboundMessage::from_bytes(&bytes)),
    }
}

/// Collects outgoing messages for one invocation and one destination queue
pub struct QueueCollector {
    client: QueueClient,
    watcher: Option<MessageEnqueuedWatcher>,
    invocation_id: Option<InvocationId>,
    serializer: Arc<dyn PayloadSerializer>,
    pending: VecDeque<OutboundMessage>,
}

impl QueueCollector {
    /// Create a collector that stamps structured messages with
    /// `invocation_id` and notifies `watcher` after each send.
    pub fn new(
        client: QueueClient,
        watcher: Option<MessageEnqueuedWatcher>,
        invocation_id: Option<InvocationId>,
    ) -> Self {
        Self {
            client,
            watcher,
            invocation_id,
            serializer: Arc::new(JsonSerializer),
            pending: VecDeque::new(),
        }
    }

    /// Replace the default JSON serializer
    pub fn with_serializer(mut self, serializer: Arc<dyn PayloadSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Destination queue
    pub fn queue_name(&self) -> &QueueName {
        self.client.name()
    }

    /// Number of messages waiting to be published
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Convert and queue a value for publishing
    pub fn add(&mut self, value: impl Into<OutboundValue>) -> Result<(), CollectorError> {
        let message = to_outbound_message(
            value.into(),
            self.invocation_id.as_ref(),
            self.serializer.as_ref(),
        )?;
        self.pending.push_back(message);
        Ok(())
    }

    /// Serialize any value and queue it as a structured message
    pub fn add_serializable<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), CollectorError> {
        self.add(OutboundValue::structured(value)?)
    }

    /// Send every pending message in the order it was added.
    ///
    /// Each send creates the queue if needed and is followed by a
    /// short-circuit notification. Nothing is rolled back on failure. If
    /// `cancel` fires mid-publish, the interrupted message may or may not
    /// have been delivered.
    pub async fn publish(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<SendReceipt>, PublishError> {
        let mut sent = Vec::with_capacity(self.pending.len());

        while let Some(message) = self.pending.front() {
            match self.client.send_create_if_missing(message, cancel).await {
                Ok(receipt) => {
                    debug!(
                        queue = %self.client.name(),
                        message_id = %receipt.message_id,
                        "Published message"
                    );
                    self.pending.pop_front();
                    sent.push(receipt);
                    if let Some(watcher) = &self.watcher {
                        watcher.notify(self.client.name());
                    }
                }
                Err(source) => {
                    warn!(
                        queue = %self.client.name(),
                        sent = sent.len(),
                        remaining = self.pending.len(),
                        error = %source,
                        "Publishing stopped"
                    );
                    return Err(PublishError {
                        queue: self.client.name().clone(),
                        sent,
                        source,
                    });
                }
            }
        }

        Ok(sent)
    }
}
