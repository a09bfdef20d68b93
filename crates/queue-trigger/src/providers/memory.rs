//! In-memory queue service implementation for testing and development.
//!
//! This module provides a fully functional in-memory queue service that:
//! - Requires queues to be created before use, like the storage service
//! - Implements visibility timeouts, pop receipts and dequeue counts
//! - Reports failures with the storage service's status and error codes
//! - Provides thread-safe concurrent access
//!
//! Tests can inject one-shot failures per operation and inspect how many
//! times each operation was called.

use crate::client::QueueService;
use crate::error::{QueueError, ServiceFailure};
use crate::message::{
    MessageId, PopReceipt, QueueMessage, QueueName, QueueProperties, SendReceipt, Timestamp,
};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Operations exposed by the queue service boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOperation {
    Send,
    Receive,
    Delete,
    UpdateVisibility,
    Create,
    GetProperties,
}

/// Configuration for the in-memory queue service
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Time a message lives in the queue before it expires
    pub message_ttl: Duration,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            message_ttl: Duration::days(7),
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    id: MessageId,
    text: String,
    insertion_time: Timestamp,
    expires_on: Timestamp,
    visible_at: Timestamp,
    dequeue_count: u32,
    pop_receipt: PopReceipt,
}

impl StoredMessage {
    fn is_visible(&self, now: &Timestamp) -> bool {
        *now >= self.visible_at
    }

    fn is_expired(&self, now: &Timestamp) -> bool {
        *now >= self.expires_on
    }
}

/// Internal state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    messages: VecDeque<StoredMessage>,
    being_deleted: bool,
}

impl InMemoryQueue {
    fn leased_message(
        &mut self,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<&mut StoredMessage, ServiceFailure> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == message_id)
            .ok_or_else(|| ServiceFailure::message_not_found(message_id.as_str()))?;

        if &message.pop_receipt != pop_receipt {
            return Err(ServiceFailure::pop_receipt_mismatch(message_id.as_str()));
        }

        Ok(message)
    }
}

// ============================================================================
// InMemoryQueueService
// ============================================================================

/// In-memory queue service implementation
#[derive(Default)]
pub struct InMemoryQueueService {
    queues: RwLock<HashMap<QueueName, InMemoryQueue>>,
    injected_failures: Mutex<HashMap<ServiceOperation, VecDeque<ServiceFailure>>>,
    call_counts: Mutex<HashMap<ServiceOperation, usize>>,
    config: InMemoryConfig,
}

impl InMemoryQueueService {
    /// Create new in-memory service with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Fail the next call of `operation` with `failure`
    pub fn inject_failure(&self, operation: ServiceOperation, failure: ServiceFailure) {
        self.injected_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(operation)
            .or_default()
            .push_back(failure);
    }

    /// Number of times `operation` has been invoked
    pub fn call_count(&self, operation: ServiceOperation) -> usize {
        self.call_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Mark a queue as being deleted; later operations fail with 409
    pub fn mark_being_deleted(&self, queue: &QueueName) {
        if let Some(q) = self.write_queues().get_mut(queue) {
            q.being_deleted = true;
        }
    }

    /// Remove a queue and all its messages
    pub fn delete_queue(&self, queue: &QueueName) -> bool {
        self.write_queues().remove(queue).is_some()
    }

    /// Number of messages stored in a queue, visible or not
    pub fn message_count(&self, queue: &QueueName) -> usize {
        self.queues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Texts of all stored messages in queue order
    pub fn peek_texts(&self, queue: &QueueName) -> Vec<String> {
        self.queues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .map(|q| q.messages.iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default()
    }

    fn write_queues(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<QueueName, InMemoryQueue>> {
        self.queues.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and surface cancellation or an injected failure
    fn begin(
        &self,
        operation: ServiceOperation,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        *self
            .call_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(operation)
            .or_default() += 1;

        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        let injected = self
            .injected_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);

        match injected {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    /// Run `f` against an existing, active queue
    fn with_queue<T>(
        &self,
        queue: &QueueName,
        f: impl FnOnce(&mut InMemoryQueue) -> Result<T, ServiceFailure>,
    ) -> Result<T, QueueError> {
        let mut queues = self.write_queues();
        let q = queues
            .get_mut(queue)
            .ok_or_else(|| ServiceFailure::queue_not_found(queue.as_str()))?;

        if q.being_deleted {
            return Err(ServiceFailure::queue_being_deleted(queue.as_str()).into());
        }

        let now = Timestamp::now();
        q.messages.retain(|m| !m.is_expired(&now));

        Ok(f(q)?)
    }
}

fn after(now: &Timestamp, delay: Duration) -> Timestamp {
    Timestamp::from_datetime(now.as_datetime() + delay)
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn send(
        &self,
        queue: &QueueName,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, QueueError> {
        self.begin(ServiceOperation::Send, cancel)?;
        let ttl = self.config.message_ttl;

        self.with_queue(queue, |q| {
            let now = Timestamp::now();
            let stored = StoredMessage {
                id: MessageId::new(),
                text: text.to_string(),
                insertion_time: now.clone(),
                expires_on: after(&now, ttl),
                visible_at: now.clone(),
                dequeue_count: 0,
                pop_receipt: PopReceipt::generate(),
            };
            let receipt = SendReceipt {
                message_id: stored.id.clone(),
                pop_receipt: stored.pop_receipt.clone(),
                insertion_time: now.clone(),
                next_visible_on: now,
            };
            q.messages.push_back(stored);
            Ok(receipt)
        })
    }

    async fn receive(
        &self,
        queue: &QueueName,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<QueueMessage>, QueueError> {
        self.begin(ServiceOperation::Receive, cancel)?;

        self.with_queue(queue, |q| {
            let now = Timestamp::now();
            let Some(stored) = q.messages.iter_mut().find(|m| m.is_visible(&now)) else {
                return Ok(None);
            };

            stored.dequeue_count += 1;
            stored.pop_receipt = PopReceipt::generate();
            stored.visible_at = after(&now, visibility_timeout);

            Ok(Some(QueueMessage {
                id: stored.id.clone(),
                pop_receipt: stored.pop_receipt.clone(),
                body: stored.text.clone(),
                dequeue_count: stored.dequeue_count,
                insertion_time: stored.insertion_time.clone(),
                expires_on: Some(stored.expires_on.clone()),
                next_visible_on: Some(stored.visible_at.clone()),
            }))
        })
    }

    async fn delete(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        self.begin(ServiceOperation::Delete, cancel)?;

        self.with_queue(queue, |q| {
            q.leased_message(message_id, pop_receipt)?;
            q.messages.retain(|m| &m.id != message_id);
            Ok(())
        })
    }

    async fn update_visibility(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        visibility_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PopReceipt, QueueError> {
        self.begin(ServiceOperation::UpdateVisibility, cancel)?;

        self.with_queue(queue, |q| {
            let stored = q.leased_message(message_id, pop_receipt)?;
            stored.pop_receipt = PopReceipt::generate();
            stored.visible_at = after(&Timestamp::now(), visibility_timeout);
            Ok(stored.pop_receipt.clone())
        })
    }

    async fn create(
        &self,
        queue: &QueueName,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        self.begin(ServiceOperation::Create, cancel)?;

        let mut queues = self.write_queues();
        match queues.get(queue) {
            Some(existing) if existing.being_deleted => {
                Err(ServiceFailure::queue_being_deleted(queue.as_str()).into())
            }
            Some(_) => Err(ServiceFailure::queue_already_exists(queue.as_str()).into()),
            None => {
                queues.insert(queue.clone(), InMemoryQueue::default());
                Ok(())
            }
        }
    }

    async fn get_properties(
        &self,
        queue: &QueueName,
        cancel: &CancellationToken,
    ) -> Result<QueueProperties, QueueError> {
        self.begin(ServiceOperation::GetProperties, cancel)?;

        self.with_queue(queue, |q| {
            Ok(QueueProperties {
                approximate_message_count: q.messages.len(),
            })
        })
    }
}
