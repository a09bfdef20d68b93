//! In-process short-circuit notifications for newly enqueued messages.
//!
//! When a message is published from inside this process, any listener for the
//! destination queue can be woken immediately instead of waiting for its next
//! poll. The message is already durable by the time [`MessageEnqueuedWatcher::notify`]
//! runs, so a missed notification only costs latency.

use crate::message::QueueName;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

struct ListenerSlot {
    id: u64,
    signal: Arc<Notify>,
}

#[derive(Default)]
struct WatcherState {
    listeners: DashMap<QueueName, Vec<ListenerSlot>>,
    next_id: AtomicU64,
}

/// Registry mapping queue names to local listeners.
///
/// Cloning yields another handle to the same registry. Construct one per
/// host and pass it to every collector and listener that should share it.
#[derive(Clone, Default)]
pub struct MessageEnqueuedWatcher {
    state: Arc<WatcherState>,
}

impl MessageEnqueuedWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `queue`. Dropping the returned listener
    /// unregisters it.
    pub fn register(&self, queue: &QueueName) -> EnqueueListener {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let signal = Arc::new(Notify::new());

        self.state
            .listeners
            .entry(queue.clone())
            .or_default()
            .push(ListenerSlot {
                id,
                signal: Arc::clone(&signal),
            });

        EnqueueListener {
            id,
            queue: queue.clone(),
            signal,
            watcher: self.clone(),
        }
    }

    /// Wake every listener registered for `queue`. No listener is a no-op.
    pub fn notify(&self, queue: &QueueName) {
        let Some(slots) = self.state.listeners.get(queue) else {
            trace!(queue = %queue, "No local listener for enqueued message");
            return;
        };

        for slot in slots.iter() {
            slot.signal.notify_one();
        }
        trace!(queue = %queue, listeners = slots.len(), "Notified local listeners");
    }

    /// Number of listeners currently registered for `queue`
    pub fn listener_count(&self, queue: &QueueName) -> usize {
        self.state
            .listeners
            .get(queue)
            .map(|slots| slots.len())
            .unwrap_or(0)
    }

    fn unregister(&self, queue: &QueueName, id: u64) {
        if let Some(mut slots) = self.state.listeners.get_mut(queue) {
            slots.retain(|slot| slot.id != id);
        }
        self.state
            .listeners
            .remove_if(queue, |_, slots| slots.is_empty());
    }
}

impl std::fmt::Debug for MessageEnqueuedWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageEnqueuedWatcher")
            .field("queues", &self.state.listeners.len())
            .finish()
    }
}

/// A registration for one queue on a [`MessageEnqueuedWatcher`]
pub struct EnqueueListener {
    id: u64,
    queue: QueueName,
    signal: Arc<Notify>,
    watcher: MessageEnqueuedWatcher,
}

impl EnqueueListener {
    /// Wait for the next notification.
    ///
    /// A notification sent while nobody was waiting is kept, so it completes
    /// the next call immediately.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue
    }
}

impl Drop for EnqueueListener {
    fn drop(&mut self) {
        self.watcher.unregister(&self.queue, self.id);
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
