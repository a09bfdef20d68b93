//! Tests for the in-memory queue service.

use super::*;
use crate::error::FailureKind;

fn queue(name: &str) -> QueueName {
    QueueName::new(name).unwrap()
}

async fn created(service: &InMemoryQueueService, name: &str) -> QueueName {
    let q = queue(name);
    service.create(&q, &CancellationToken::new()).await.unwrap();
    q
}

// ============================================================================
// Queue Management
// ============================================================================

mod queue_management {
    use super::*;

    #[tokio::test]
    async fn test_operations_on_missing_queue_fail_with_queue_not_found() {
        let service = InMemoryQueueService::default();
        let q = queue("missing");
        let cancel = CancellationToken::new();

        let send = service.send(&q, "x", &cancel).await.unwrap_err();
        assert_eq!(send.kind(), FailureKind::NotFoundQueue);

        let receive = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap_err();
        assert_eq!(receive.kind(), FailureKind::NotFoundQueue);

        let props = service.get_properties(&q, &cancel).await.unwrap_err();
        assert_eq!(props.service_failure().map(|f| f.status), Some(404));
    }

    #[tokio::test]
    async fn test_create_twice_reports_already_exists() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;

        let err = service
            .create(&q, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err
            .service_failure()
            .map(|f| f.is_conflict_queue_already_exists())
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn test_queue_being_deleted_conflicts() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        service.mark_being_deleted(&q);

        let err = service
            .send(&q, "x", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Conflict);

        let err = service.create(&q, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_queue_removes_messages() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        service.send(&q, "x", &CancellationToken::new()).await.unwrap();

        assert!(service.delete_queue(&q));
        assert_eq!(service.message_count(&q), 0);
        assert!(!service.delete_queue(&q));
    }
}

// ============================================================================
// Message Lifecycle
// ============================================================================

mod message_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_send_receive_delete() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();

        let receipt = service.send(&q, "hello", &cancel).await.unwrap();
        let message = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap()
            .expect("message should be visible");

        assert_eq!(message.id, receipt.message_id);
        assert_eq!(message.body, "hello");
        assert_eq!(message.dequeue_count, 1);
        assert_ne!(message.pop_receipt, receipt.pop_receipt);

        service
            .delete(&q, &message.id, &message.pop_receipt, &cancel)
            .await
            .unwrap();
        assert_eq!(service.message_count(&q), 0);
    }

    #[test]
    fn test_properties_count_pending_messages() {
        let service = InMemoryQueueService::default();
        let cancel = CancellationToken::new();

        let props = tokio_test::block_on(async {
            let q = created(&service, "orders").await;
            tokio_test::assert_ok!(service.send(&q, "one", &cancel).await);
            tokio_test::assert_ok!(service.send(&q, "two", &cancel).await);
            service.get_properties(&q, &cancel).await
        });

        assert_eq!(tokio_test::assert_ok!(props).approximate_message_count, 2);
    }

    #[tokio::test]
    async fn test_leased_message_is_invisible() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.send(&q, "hello", &cancel).await.unwrap();

        let first = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap();
        assert!(second.is_none(), "Leased message must stay hidden");
    }

    #[tokio::test]
    async fn test_redelivery_increments_dequeue_count_and_rotates_receipt() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.send(&q, "hello", &cancel).await.unwrap();

        let first = service
            .receive(&q, Duration::zero(), &cancel)
            .await
            .unwrap()
            .unwrap();
        let second = service
            .receive(&q, Duration::zero(), &cancel)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.dequeue_count, 2);
        assert_ne!(first.pop_receipt, second.pop_receipt);
    }

    #[tokio::test]
    async fn test_stale_pop_receipt_fails_without_corrupting_state() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.send(&q, "hello", &cancel).await.unwrap();

        let stale = service
            .receive(&q, Duration::zero(), &cancel)
            .await
            .unwrap()
            .unwrap();
        let current = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap()
            .unwrap();

        let err = service
            .delete(&q, &stale.id, &stale.pop_receipt, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::PreconditionFailed);
        assert_eq!(service.message_count(&q), 1);

        service
            .delete(&q, &current.id, &current.pop_receipt, &cancel)
            .await
            .unwrap();

        let err = service
            .delete(&q, &current.id, &current.pop_receipt, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFoundMessage);
    }

    #[tokio::test]
    async fn test_update_visibility_releases_message() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.send(&q, "hello", &cancel).await.unwrap();

        let leased = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap()
            .unwrap();
        let new_receipt = service
            .update_visibility(&q, &leased.id, &leased.pop_receipt, Duration::zero(), &cancel)
            .await
            .unwrap();
        assert_ne!(new_receipt, leased.pop_receipt);

        let redelivered = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap()
            .expect("released message should be visible again");
        assert_eq!(redelivered.dequeue_count, 2);
    }

    #[tokio::test]
    async fn test_expired_messages_are_dropped() {
        let service = InMemoryQueueService::new(InMemoryConfig {
            message_ttl: Duration::zero(),
        });
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.send(&q, "hello", &cancel).await.unwrap();

        let received = service
            .receive(&q, Duration::seconds(30), &cancel)
            .await
            .unwrap();
        assert!(received.is_none());
    }
}

// ============================================================================
// Test Hooks
// ============================================================================

mod test_hooks {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        service.inject_failure(
            ServiceOperation::Send,
            ServiceFailure::server_error(503, "busy"),
        );

        let err = service.send(&q, "x", &cancel).await.unwrap_err();
        assert!(err.is_transient());
        assert!(service.send(&q, "x", &cancel).await.is_ok());
        assert_eq!(service.call_count(ServiceOperation::Send), 2);
    }

    #[tokio::test]
    async fn test_cancelled_calls_are_counted_but_not_applied() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service.send(&q, "x", &cancel).await.unwrap_err();
        assert!(matches!(err, QueueError::Cancelled));
        assert_eq!(service.message_count(&q), 0);
        assert_eq!(service.call_count(ServiceOperation::Send), 1);
    }

    #[tokio::test]
    async fn test_peek_texts_preserves_order() {
        let service = InMemoryQueueService::default();
        let q = created(&service, "orders").await;
        let cancel = CancellationToken::new();
        for text in ["a", "b", "c"] {
            service.send(&q, text, &cancel).await.unwrap();
        }

        assert_eq!(service.peek_texts(&q), vec!["a", "b", "c"]);
    }
}
