//! Tests for the queue writer.

use super::*;
use crate::client::QueueService;
use crate::providers::InMemoryQueueService;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct ControlMessage<'a> {
    function_id: &'a str,
    attempt: u32,
}

#[tokio::test]
async fn test_enqueue_serializes_notifies_and_reports_id() {
    let service = Arc::new(InMemoryQueueService::default());
    let queue = QueueName::new("control").unwrap();
    let dyn_service: Arc<dyn QueueService> = service.clone();
    let watcher = MessageEnqueuedWatcher::new();
    let listener = watcher.register(&queue);
    let writer = QueueWriter::new(QueueClient::new(dyn_service, queue.clone()), watcher);

    let (written_to, message_id) = writer
        .enqueue(
            &ControlMessage {
                function_id: "Functions.Process",
                attempt: 2,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(written_to, queue);
    assert!(!message_id.as_str().is_empty());
    assert_eq!(
        service.peek_texts(&queue),
        vec![r#"{"function_id":"Functions.Process","attempt":2}"#]
    );
    tokio::time::timeout(Duration::from_secs(1), listener.notified())
        .await
        .expect("listener should be notified");
}

#[tokio::test(start_paused = true)]
async fn test_failed_enqueue_does_not_notify() {
    let service = Arc::new(InMemoryQueueService::default());
    let queue = QueueName::new("control").unwrap();
    let dyn_service: Arc<dyn QueueService> = service.clone();
    let watcher = MessageEnqueuedWatcher::new();
    let listener = watcher.register(&queue);
    let writer = QueueWriter::new(QueueClient::new(dyn_service, queue.clone()), watcher);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = writer.enqueue(&"payload", &cancel).await;

    assert!(matches!(result, Err(QueueError::Cancelled)));
    assert!(
        tokio::time::timeout(Duration::from_millis(50), listener.notified())
            .await
            .is_err()
    );
}
