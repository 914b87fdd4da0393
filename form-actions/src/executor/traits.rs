//! Core traits for action execution.
//!
//! This module defines the `ActionExecutor` trait - the seam between the form
//! engine and the backend action-execution service. Action descriptors are
//! passed through without interpretation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use form_schema::ActionDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error types for collaborator calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    /// Backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Transport-level request failure (HTTP status and body)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The action ran and reported `success: false`
    #[error("{message}")]
    Rejected { message: String },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ActionError {
    /// Rejection with a message, defaulting when the backend sent none.
    pub fn rejected(message: Option<String>) -> Self {
        Self::Rejected {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "The action could not be completed".to_string()),
        }
    }
}

/// Ambient information sent with every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    /// Form instance that issued the action
    pub form_id: String,
    /// Record being edited, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Unique id of this invocation
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
}

impl ActionContext {
    /// Create a context for a fresh invocation from `form_id`.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            record_id: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            requested_at: Utc::now(),
        }
    }

    /// Set the record being edited.
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

/// Input plus context for one action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub input: Value,
    pub context: ActionContext,
}

impl ActionRequest {
    pub fn new(input: Value, context: ActionContext) -> Self {
        Self { input, context }
    }
}

/// Result envelope returned by the action service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    /// Successful response carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Failed response with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Turn `success: false` into [`ActionError::Rejected`].
    pub fn into_result(self) -> Result<Self, ActionError> {
        if self.success {
            Ok(self)
        } else {
            Err(ActionError::rejected(self.message))
        }
    }
}

/// Core trait for the action-execution collaborator.
///
/// Implementations either reject (transport failure) or resolve with an
/// [`ActionResponse`] that may itself report `success: false`.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Get the executor identifier.
    fn id(&self) -> &str;

    /// Execute an action.
    async fn execute(
        &self,
        action: &ActionDescriptor,
        request: ActionRequest,
    ) -> Result<ActionResponse, ActionError>;

    /// Execute an action and fold application failures into the error path.
    async fn execute_checked(
        &self,
        action: &ActionDescriptor,
        request: ActionRequest,
    ) -> Result<ActionResponse, ActionError> {
        self.execute(action, request).await?.into_result()
    }
}
