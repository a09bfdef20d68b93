//! Queue service boundary and the reliability adapter built on top of it.

use crate::error::QueueError;
use crate::message::{
    MessageId, OutboundMessage, PopReceipt, QueueMessage, QueueName, QueueProperties, SendReceipt,
};
use async_trait::async_trait;
use chrono::Duration;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by a durable queue backend.
///
/// Every call may fail with [`QueueError::Service`] carrying the service's
/// status and error code; callers classify it with
/// [`QueueError::kind`](crate::error::QueueError::kind).
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Enqueue message text
    async fn send(
        &self,
        queue: &QueueName,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, QueueError>;

    /// Lease the next visible message for `visibility_timeout`
    async fn receive(
        &self,
        queue: &QueueName,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<QueueMessage>, QueueError>;

    /// Delete a leased message
    async fn delete(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError>;

    /// Change the visibility of a leased message, returning the new receipt
    async fn update_visibility(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PopReceipt, QueueError>;

    /// Create the queue; fails with 409 `QueueAlreadyExists` if present
    async fn create(&self, queue: &QueueName, cancel: &CancellationToken)
        -> Result<(), QueueError>;

    /// Fetch queue metadata
    async fn get_properties(
        &self,
        queue: &QueueName,
        cancel: &CancellationToken,
    ) -> Result<QueueProperties, QueueError>;
}

/// Run `operation` unless `cancel` fires first
async fn with_cancellation<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, QueueError>>,
{
    if cancel.is_cancelled() {
        return Err(QueueError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueueError::Cancelled),
        result = operation => result,
    }
}

/// Client for a single queue with create-on-demand semantics
#[derive(Clone)]
pub struct QueueClient {
    service: Arc<dyn QueueService>,
    name: QueueName,
}

impl QueueClient {
    pub fn new(service: Arc<dyn QueueService>, name: QueueName) -> Self {
        Self { service, name }
    }

    /// The queue this client is bound to
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Client for another queue on the same service
    pub fn sibling(&self, name: QueueName) -> Self {
        Self::new(Arc::clone(&self.service), name)
    }

    /// Create the queue if it does not exist.
    ///
    /// Returns `true` when this call created the queue. A queue that already
    /// exists, including one created concurrently by someone else, is
    /// success.
    pub async fn ensure_exists(&self, cancel: &CancellationToken) -> Result<bool, QueueError> {
        let result =
            with_cancellation(cancel, self.service.create(&self.name, cancel)).await;

        match result {
            Ok(()) => {
                info!(queue = %self.name, "Created queue");
                Ok(true)
            }
            Err(QueueError::Service(failure)) if failure.is_conflict_queue_already_exists() => {
                debug!(queue = %self.name, "Queue already exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Send a message, creating the queue and retrying once if it is missing.
    ///
    /// Any failure other than `QueueNotFound` on the first attempt is returned
    /// unmodified.
    pub async fn send_create_if_missing(
        &self,
        message: &OutboundMessage,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, QueueError> {
        let first = with_cancellation(cancel, self.service.send(&self.name, message.text(), cancel))
            .await;

        match first {
            Err(QueueError::Service(failure)) if failure.is_not_found_queue_not_found() => {
                debug!(queue = %self.name, "Queue missing on send, creating it and retrying");
            }
            other => return other,
        }

        self.ensure_exists(cancel).await?;
        with_cancellation(cancel, self.service.send(&self.name, message.text(), cancel)).await
    }

    /// Probe whether the queue exists.
    ///
    /// 404 means it does not. 412 Precondition Failed is reported by the
    /// storage service for queues that do exist, so it counts as `true`.
    pub async fn exists(&self, cancel: &CancellationToken) -> Result<bool, QueueError> {
        let result =
            with_cancellation(cancel, self.service.get_properties(&self.name, cancel)).await;

        match result {
            Ok(_) => Ok(true),
            Err(QueueError::Service(failure)) if failure.status == 404 => Ok(false),
            Err(QueueError::Service(failure)) if failure.status == 412 => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Queue metadata
    pub async fn properties(
        &self,
        cancel: &CancellationToken,
    ) -> Result<QueueProperties, QueueError> {
        with_cancellation(cancel, self.service.get_properties(&self.name, cancel)).await
    }

    /// Lease the next visible message
    pub async fn receive(
        &self,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<QueueMessage>, QueueError> {
        with_cancellation(
            cancel,
            self.service.receive(&self.name, visibility_timeout, cancel),
        )
        .await
    }

    /// Delete a leased message using its current pop receipt
    pub async fn delete_message(
        &self,
        message: &QueueMessage,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        with_cancellation(
            cancel,
            self.service
                .delete(&self.name, &message.id, &message.pop_receipt, cancel),
        )
        .await
    }

    /// Make a leased message visible again after `visibility_timeout`.
    ///
    /// The message's pop receipt is replaced with the new lease token.
    pub async fn update_visibility(
        &self,
        message: &mut QueueMessage,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let receipt = with_cancellation(
            cancel,
            self.service.update_visibility(
                &self.name,
                &message.id,
                &message.pop_receipt,
                visibility_timeout,
                cancel,
            ),
        )
        .await?;

        message.pop_receipt = receipt;
        Ok(())
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
