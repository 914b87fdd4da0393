//! Quick-create sub-form.
//!
//! Lets the user create a new lookup option without leaving the form. The
//! sub-form collects a name and a code; the code follows the name's slug
//! until the user edits it.
//!
//! ```text
//!   Idle ──open(field)──▶ Open ──begin_submit──▶ Submitting
//!    ▲                     │  ▲                      │
//!    └──────cancel─────────┘  └──────failure─────────┤
//!    ▲                                               │
//!    └────────────────────success────────────────────┘
//! ```

use serde_json::{json, Value};

use form_actions::{ActionError, ActionResponse};
use form_schema::{slugify_with_limit, ActionDescriptor, FieldSchema, FormFieldOption};

use crate::types::{FormError, Result};

/// An open quick-create sub-form.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickCreateSession {
    /// Field the created option is written back into
    pub field_name: String,
    pub lookup_id: String,
    pub action: ActionDescriptor,
    pub title: String,
    pub description: Option<String>,
    pub name: String,
    pub code: String,
    code_edited: bool,
    submitting: bool,
    error: Option<String>,
    max_len: usize,
}

/// Payload of one quick-create submission.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickCreateSubmission {
    pub field_name: String,
    pub lookup_id: String,
    pub action: ActionDescriptor,
    pub input: Value,
    /// Option to fall back on when the response does not describe one
    pub fallback: FormFieldOption,
}

impl QuickCreateSession {
    /// Open the sub-form for `field`, which must already be augmented so
    /// that its quick-create action is resolved.
    pub fn open(field: &FieldSchema, max_len: usize) -> Result<Self> {
        let quick_create = field
            .quick_create
            .as_ref()
            .ok_or_else(|| FormError::QuickCreateUnsupported(field.name.clone()))?;
        let lookup_id = field
            .lookup_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FormError::MissingLookup(field.name.clone()))?;
        let action = quick_create
            .action
            .clone()
            .ok_or_else(|| FormError::QuickCreateUnsupported(field.name.clone()))?;

        Ok(Self {
            field_name: field.name.clone(),
            lookup_id,
            action,
            title: quick_create
                .label
                .clone()
                .unwrap_or_else(|| format!("New {}", field.display_label())),
            description: quick_create.description.clone(),
            name: String::new(),
            code: String::new(),
            code_edited: false,
            submitting: false,
            error: None,
            max_len,
        })
    }

    /// Update the name; the code follows unless it was edited.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if !self.code_edited {
            self.code = slugify_with_limit(&self.name, self.max_len);
        }
    }

    /// Update the code and stop deriving it from the name.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.code_edited = true;
    }

    pub fn code_edited(&self) -> bool {
        self.code_edited
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Inline error from the last attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Check the inputs and mark the sub-form as submitting.
    pub fn begin_submit(&mut self) -> Result<QuickCreateSubmission> {
        if self.submitting {
            return Err(FormError::InFlight("Quick-create"));
        }

        let name = self.name.trim();
        let code = self.code.trim();
        if self.lookup_id.trim().is_empty() {
            return Err(FormError::MissingLookup(self.field_name.clone()));
        }
        if name.is_empty() || code.is_empty() {
            let err = FormError::InvalidInput("Name and code are required".to_string());
            self.error = Some(err.user_message());
            return Err(err);
        }

        let submission = QuickCreateSubmission {
            field_name: self.field_name.clone(),
            lookup_id: self.lookup_id.clone(),
            action: self.action.clone(),
            input: json!({
                "lookupId": self.lookup_id,
                "name": name,
                "code": code,
            }),
            fallback: FormFieldOption::new(code, name),
        };
        self.submitting = true;
        self.error = None;
        Ok(submission)
    }

    /// Record the outcome of a submission.
    ///
    /// On success returns the created option; on failure keeps the sub-form
    /// open with the error shown inline.
    pub fn finish_submit(
        &mut self,
        submission: &QuickCreateSubmission,
        result: std::result::Result<ActionResponse, ActionError>,
    ) -> Result<FormFieldOption> {
        self.submitting = false;
        match result.and_then(ActionResponse::into_result) {
            Ok(response) => Ok(created_option(response.data.as_ref(), &submission.fallback)),
            Err(err) => {
                self.error = Some(err.to_string());
                Err(FormError::Action(err))
            }
        }
    }
}

/// Extract the created option from response data.
///
/// Accepts `{value, label}` at the top level or under `option`. A missing
/// label falls back to the submitted name; no usable value falls back to the
/// submitted code.
pub fn created_option(data: Option<&Value>, fallback: &FormFieldOption) -> FormFieldOption {
    let candidate = data.and_then(|d| {
        if d.get("value").is_some() {
            Some(d)
        } else {
            d.get("option")
        }
    });

    let Some(candidate) = candidate else {
        return fallback.clone();
    };
    let Some(value) = option_text(candidate.get("value")) else {
        return fallback.clone();
    };
    let label = option_text(candidate.get("label")).unwrap_or_else(|| fallback.label.clone());
    FormFieldOption::new(value, label)
}

fn option_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
