//! Mock action executor for testing.

use async_trait::async_trait;
use form_schema::ActionDescriptor;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::traits::*;

/// One call observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action: ActionDescriptor,
    pub request: ActionRequest,
}

type Scripted = Result<ActionResponse, ActionError>;

/// Mock executor for testing.
///
/// Responses are scripted per handler. Each scripted result is consumed in
/// order; the last one for a handler repeats. Unscripted handlers succeed
/// with `data: null`.
pub struct MockExecutor {
    executor_id: String,
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicU32,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new(executor_id: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Script a response for `handler`.
    pub fn with_response(self, handler: impl Into<String>, response: ActionResponse) -> Self {
        self.script(handler, Ok(response))
    }

    /// Script a transport failure for `handler`.
    pub fn with_error(self, handler: impl Into<String>, error: ActionError) -> Self {
        self.script(handler, Err(error))
    }

    fn script(mut self, handler: impl Into<String>, result: Scripted) -> Self {
        self.scripts
            .get_mut()
            .entry(handler.into())
            .or_default()
            .push_back(result);
        self
    }

    /// Get the number of times execute was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get every recorded call.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Get the most recent call.
    pub async fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().await.last().cloned()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new("mock-executor")
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    fn id(&self) -> &str {
        &self.executor_id
    }

    async fn execute(
        &self,
        action: &ActionDescriptor,
        request: ActionRequest,
    ) -> Result<ActionResponse, ActionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(RecordedCall {
            action: action.clone(),
            request,
        });

        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(&action.handler) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(ActionResponse::ok(serde_json::Value::Null))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(ActionResponse::ok(serde_json::Value::Null))),
            None => Ok(ActionResponse::ok(serde_json::Value::Null)),
        }
    }
}
