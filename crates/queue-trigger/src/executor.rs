//! Turns a dequeued message into one function execution.
//!
//! The executor reconstructs the causality parent and diagnostic details of
//! a message, hands them to the function host and reports the outcome. It
//! never retries: redelivery and poisoning are decided by whoever polls the
//! queue, based on the reported [`FunctionResult`].

use crate::causality;
use crate::message::{InvocationId, QueueMessage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

pub const MESSAGE_ID_KEY: &str = "MessageId";
pub const DEQUEUE_COUNT_KEY: &str = "DequeueCount";
pub const INSERTION_TIME_KEY: &str = "InsertionTime";

/// Lifecycle of a single dequeued message inside the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Received,
    Executing,
    Succeeded,
    Failed,
}

impl TriggerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Input handed to the function host for one triggered execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredFunctionData {
    /// Invocation that produced the message, if it was stamped
    pub parent_id: Option<InvocationId>,
    pub trigger_value: QueueMessage,
    /// `MessageId`, `DequeueCount` and `InsertionTime`
    pub trigger_details: BTreeMap<String, String>,
}

/// Outcome of a function execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    pub succeeded: bool,
    pub error: Option<String>,
}

impl FunctionResult {
    pub fn succeeded() -> Self {
        Self {
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
        }
    }

    /// Terminal state this result corresponds to
    pub fn state(&self) -> TriggerState {
        if self.succeeded {
            TriggerState::Succeeded
        } else {
            TriggerState::Failed
        }
    }
}

/// The function host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    /// Run the function once for `input`
    async fn try_execute(
        &self,
        input: TriggeredFunctionData,
        cancel: &CancellationToken,
    ) -> FunctionResult;
}

/// Diagnostic details recorded for a triggered execution
pub fn populate_trigger_details(message: &QueueMessage) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MESSAGE_ID_KEY.to_string(), message.id.to_string()),
        (
            DEQUEUE_COUNT_KEY.to_string(),
            message.dequeue_count.to_string(),
        ),
        (
            INSERTION_TIME_KEY.to_string(),
            message.insertion_time.to_iso8601(),
        ),
    ])
}

/// Executes functions triggered by queue messages
#[derive(Clone)]
pub struct QueueTriggerExecutor {
    inner: Arc<dyn FunctionExecutor>,
}

impl QueueTriggerExecutor {
    pub fn new(inner: Arc<dyn FunctionExecutor>) -> Self {
        Self { inner }
    }

    /// Build the invocation input for `message` without running anything
    pub fn prepare(message: &QueueMessage) -> TriggeredFunctionData {
        TriggeredFunctionData {
            parent_id: causality::extract_parent(message),
            trigger_value: message.clone(),
            trigger_details: populate_trigger_details(message),
        }
    }

    /// Run the function for one dequeued message and report the outcome
    #[instrument(
        skip_all,
        fields(message_id = %message.id, dequeue_count = message.dequeue_count)
    )]
    pub async fn execute(
        &self,
        message: &QueueMessage,
        cancel: &CancellationToken,
    ) -> FunctionResult {
        let input = Self::prepare(message);
        debug!(
            state = ?TriggerState::Received,
            parent_id = input.parent_id.as_ref().map(InvocationId::as_str),
            "Prepared triggered invocation"
        );

        debug!(state = ?TriggerState::Executing, "Executing function");
        let result = self.inner.try_execute(input, cancel).await;

        match result.state() {
            TriggerState::Succeeded => {
                debug!(state = ?TriggerState::Succeeded, "Function succeeded")
            }
            state => warn!(
                state = ?state,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Function failed"
            ),
        }

        result
    }
}

impl std::fmt::Debug for QueueTriggerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTriggerExecutor").finish_non_exhaustive()
    }
}
