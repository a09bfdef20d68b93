//! Polling loop that feeds one queue into the trigger executor.

use crate::client::QueueClient;
use crate::config::QueuesOptions;
use crate::error::{FailureKind, QueueError};
use crate::executor::QueueTriggerExecutor;
use crate::message::{OutboundMessage, QueueMessage};
use crate::notifier::MessageEnqueuedWatcher;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

/// What happened to the queue during one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No visible message
    Empty,
    /// Function succeeded and the message was deleted
    Completed,
    /// Function failed and the message was made visible again
    Released,
    /// Message was moved to the poison queue
    Poisoned,
    /// The lease expired or the message was removed by someone else
    LeaseLost,
}

/// Delete and visibility failures that only mean our lease is gone
fn is_lease_lost(error: &QueueError) -> bool {
    matches!(
        error.kind(),
        FailureKind::NotFoundMessage | FailureKind::PreconditionFailed
    )
}

/// Listens on one queue and runs its function for every message
#[derive(Debug, Clone)]
pub struct QueueListener {
    client: QueueClient,
    poison: QueueClient,
    executor: QueueTriggerExecutor,
    watcher: MessageEnqueuedWatcher,
    options: QueuesOptions,
}

impl QueueListener {
    pub fn new(
        client: QueueClient,
        executor: QueueTriggerExecutor,
        watcher: MessageEnqueuedWatcher,
        options: QueuesOptions,
    ) -> Result<Self, QueueError> {
        let poison_name = client
            .name()
            .poison_queue(&options.poison_queue_suffix)?;
        let poison = client.sibling(poison_name);

        Ok(Self {
            client,
            poison,
            executor,
            watcher,
            options,
        })
    }

    pub fn client(&self) -> &QueueClient {
        &self.client
    }

    pub fn poison_client(&self) -> &QueueClient {
        &self.poison
    }

    /// Receive and process at most one message
    #[instrument(skip_all, fields(queue = %self.client.name()))]
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<ProcessOutcome, QueueError> {
        let Some(mut message) = self
            .client
            .receive(self.options.lease_timeout(), cancel)
            .await?
        else {
            return Ok(ProcessOutcome::Empty);
        };

        if message.has_exceeded_max_dequeue_count(self.options.max_dequeue_count) {
            warn!(
                message_id = %message.id,
                dequeue_count = message.dequeue_count,
                "Message already exceeded max dequeue count"
            );
            return self.poison_message(&message, cancel).await;
        }

        let result = self.executor.execute(&message, cancel).await;

        if result.succeeded {
            return match self.client.delete_message(&message, cancel).await {
                Ok(()) => Ok(ProcessOutcome::Completed),
                Err(e) if is_lease_lost(&e) => {
                    warn!(message_id = %message.id, error = %e, "Lease lost before delete");
                    Ok(ProcessOutcome::LeaseLost)
                }
                Err(e) => Err(e),
            };
        }

        if message.dequeue_count >= self.options.max_dequeue_count {
            return self.poison_message(&message, cancel).await;
        }

        match self
            .client
            .update_visibility(&mut message, self.options.visibility_timeout(), cancel)
            .await
        {
            Ok(()) => {
                debug!(
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    "Released message for redelivery"
                );
                Ok(ProcessOutcome::Released)
            }
            Err(e) if is_lease_lost(&e) => {
                warn!(message_id = %message.id, error = %e, "Lease lost before release");
                Ok(ProcessOutcome::LeaseLost)
            }
            Err(e) => Err(e),
        }
    }

    async fn poison_message(
        &self,
        message: &QueueMessage,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, QueueError> {
        self.poison
            .send_create_if_missing(&OutboundMessage::from_text(message.body.clone()), cancel)
            .await?;
        self.watcher.notify(self.poison.name());

        warn!(
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            poison_queue = %self.poison.name(),
            "Moved message to poison queue"
        );

        match self.client.delete_message(message, cancel).await {
            Ok(()) => Ok(ProcessOutcome::Poisoned),
            Err(e) if is_lease_lost(&e) => Ok(ProcessOutcome::LeaseLost),
            Err(e) => Err(e),
        }
    }

    /// Poll until `cancel` fires.
    ///
    /// Messages are processed back to back while the queue has them. Once it
    /// is empty the delay doubles up to the max polling interval; a local
    /// enqueue notification resets it.
    pub async fn run(&self, cancel: CancellationToken) {
        let enqueued = self.watcher.register(self.client.name());
        let min_delay = self.options.min_polling_interval();
        let max_delay = self.options.max_polling_interval();
        let mut delay = min_delay;

        info!(queue = %self.client.name(), "Queue listener started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.poll_once(&cancel).await {
                Ok(ProcessOutcome::Empty) => {}
                Ok(_) => {
                    delay = min_delay;
                    continue;
                }
                Err(QueueError::Cancelled) => break,
                Err(e) if e.is_transient() => {
                    warn!(queue = %self.client.name(), error = %e, "Transient polling failure");
                }
                Err(e) => {
                    error!(queue = %self.client.name(), error = %e, "Polling failed");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = enqueued.notified() => {
                    debug!(queue = %self.client.name(), "Woken by local enqueue");
                    delay = min_delay;
                }
                _ = tokio::time::sleep(delay) => {
                    delay = next_delay(delay, max_delay);
                }
            }
        }

        info!(queue = %self.client.name(), "Queue listener stopped");
    }
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
