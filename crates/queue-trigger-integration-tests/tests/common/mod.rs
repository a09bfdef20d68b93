//! Common test utilities for queue-trigger integration tests
//!
//! This module provides:
//! - Test logging setup
//! - A function host that records every invocation it receives
//! - A wired-up host fixture over the in-memory queue service

use async_trait::async_trait;
use queue_trigger::{
    FunctionExecutor, FunctionResult, InMemoryQueueService, MessageEnqueuedWatcher, QueueClient,
    QueueName, QueueService, QueueTriggerExecutor, QueuesOptions, TriggeredFunctionData,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Install a test subscriber once; honours `RUST_LOG`
#[allow(dead_code)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queue_trigger=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Recording Function
// ============================================================================

/// Function host that records its inputs and answers from a fixed script
#[derive(Clone)]
#[allow(dead_code)]
pub struct RecordingFunction {
    calls: Arc<Mutex<Vec<TriggeredFunctionData>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

#[allow(dead_code)]
impl RecordingFunction {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing(error: &str) -> Self {
        let function = Self::new();
        *function.fail_with.lock().unwrap() = Some(error.to_string());
        function
    }

    pub fn calls(&self) -> Vec<TriggeredFunctionData> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FunctionExecutor for RecordingFunction {
    async fn try_execute(
        &self,
        input: TriggeredFunctionData,
        _cancel: &CancellationToken,
    ) -> FunctionResult {
        self.calls.lock().unwrap().push(input);
        match self.fail_with.lock().unwrap().as_ref() {
            Some(error) => FunctionResult::failed(error.clone()),
            None => FunctionResult::succeeded(),
        }
    }
}

// ============================================================================
// Host Fixture
// ============================================================================

/// One in-memory queue service shared by every client in a test
#[allow(dead_code)]
pub struct TestHost {
    pub service: Arc<InMemoryQueueService>,
    pub watcher: MessageEnqueuedWatcher,
}

#[allow(dead_code)]
impl TestHost {
    pub fn new() -> Self {
        init_test_logging();
        Self {
            service: Arc::new(InMemoryQueueService::default()),
            watcher: MessageEnqueuedWatcher::new(),
        }
    }

    pub fn client(&self, name: &str) -> QueueClient {
        let service: Arc<dyn QueueService> = self.service.clone();
        QueueClient::new(service, QueueName::new(name).unwrap())
    }

    pub fn executor(&self, function: &RecordingFunction) -> QueueTriggerExecutor {
        QueueTriggerExecutor::new(Arc::new(function.clone()))
    }
}

/// Options with instant release and a short polling backoff
#[allow(dead_code)]
pub fn fast_options(max_dequeue_count: u32) -> QueuesOptions {
    QueuesOptions {
        max_dequeue_count,
        visibility_timeout_secs: 0,
        lease_timeout_secs: 30,
        min_polling_interval_ms: 10,
        max_polling_interval_ms: 1_000,
        ..QueuesOptions::default()
    }
}
