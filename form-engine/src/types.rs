//! Core types for the form engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use form_actions::ActionError;
use form_schema::SchemaError;

/// Who originated a value-store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOrigin {
    /// Direct input into the rendered control
    User,
    /// Derivation engine output
    Derived,
    /// Household or family reconciliation
    Reconciled,
    /// Quick-create completion or other programmatic writes
    Programmatic,
}

/// A pending write to the value store.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub value: Value,
    pub origin: WriteOrigin,
}

impl FieldWrite {
    pub fn new(field: impl Into<String>, value: Value, origin: WriteOrigin) -> Self {
        Self {
            field: field.into(),
            value,
            origin,
        }
    }
}

/// A committed change, delivered to store subscribers and reactors.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub field: String,
    pub previous: Option<Value>,
    pub value: Value,
    pub origin: WriteOrigin,
}

/// Validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Transient user-visible message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Error types for the form engine.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Schema failed validation
    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    /// One or more fields failed validation
    #[error("{} field(s) failed validation", .0.len())]
    Validation(Vec<FieldError>),

    /// Field is not part of the form
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Quick-create requested on a field without a lookup
    #[error("Field {0} has no lookup to create options for")]
    MissingLookup(String),

    /// Field does not declare quick-create
    #[error("Field {0} does not support quick-create")]
    QuickCreateUnsupported(String),

    /// A network operation of this kind is already running
    #[error("{0} is already in progress")]
    InFlight(&'static str),

    /// No quick-create sub-form is open
    #[error("No quick-create form is open")]
    NoQuickCreate,

    /// Sub-form input is incomplete
    #[error("{0}")]
    InvalidInput(String),

    /// Household key does not match any option
    #[error("Unknown household: {0}")]
    UnknownHousehold(String),

    /// Tab id is not part of the form
    #[error("Unknown tab: {0}")]
    UnknownTab(String),

    /// Collaborator failure
    #[error("Action failed: {0}")]
    Action(#[from] ActionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FormError {
    /// Message suitable for inline display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Action(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

/// Text content of a value; numbers are rendered, other kinds are empty.
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Whether a value counts as empty for required/empty-only checks.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}
