//! Field validation.

use serde_json::Value;

use form_schema::{FieldSchema, FieldType};

use crate::types::{is_empty_value, FieldError};

/// Check one field's value. Hidden and invisible fields are skipped by the
/// caller; this only looks at the value.
pub fn check_field(field: &FieldSchema, value: Option<&Value>) -> Option<FieldError> {
    if field.required && is_missing(field, value) {
        return Some(FieldError::new(
            &field.name,
            format!("{} is required", field.display_label()),
        ));
    }
    if is_empty_value(value) {
        return None;
    }

    match field.field_type {
        kind if kind.is_numeric() && !is_numeric(value) => Some(FieldError::new(
            &field.name,
            format!("{} must be a number", field.display_label()),
        )),
        FieldType::Email if !is_email(value) => Some(FieldError::new(
            &field.name,
            format!("{} must be an email address", field.display_label()),
        )),
        _ => None,
    }
}

fn is_missing(field: &FieldSchema, value: Option<&Value>) -> bool {
    if field.field_type == FieldType::Checkbox {
        return value != Some(&Value::Bool(true));
    }
    is_empty_value(value)
}

fn is_numeric(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(_)) => true,
        Some(Value::String(s)) => s.trim().replace(',', "").parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_email(value: Option<&Value>) -> bool {
    let Some(Value::String(text)) = value else {
        return false;
    };
    let text = text.trim();
    let mut parts = text.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}
