//! Single-message typed enqueue for internal control messages.

use crate::client::QueueClient;
use crate::error::{QueueError, SerializationError};
use crate::message::{MessageId, OutboundMessage, QueueName};
use crate::notifier::MessageEnqueuedWatcher;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Writes serialized messages to one queue and wakes local listeners
#[derive(Debug, Clone)]
pub struct QueueWriter {
    client: QueueClient,
    watcher: MessageEnqueuedWatcher,
}

impl QueueWriter {
    pub fn new(client: QueueClient, watcher: MessageEnqueuedWatcher) -> Self {
        Self { client, watcher }
    }

    /// Serialize `message` as JSON and enqueue it, creating the queue if
    /// needed. Returns where it went and the id the service assigned.
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        message: &T,
        cancel: &CancellationToken,
    ) -> Result<(QueueName, MessageId), QueueError> {
        let contents = serde_json::to_string(message).map_err(SerializationError::from)?;
        let receipt = self
            .client
            .send_create_if_missing(&OutboundMessage::from_text(contents), cancel)
            .await?;

        self.watcher.notify(self.client.name());
        debug!(
            queue = %self.client.name(),
            message_id = %receipt.message_id,
            "Enqueued message"
        );

        Ok((self.client.name().clone(), receipt.message_id))
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
