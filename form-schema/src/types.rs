//! Core field description types.
//!
//! These types arrive from the metadata service as camelCase JSON and are
//! treated as immutable for the duration of a render pass.
//!
//! With the `typescript` feature enabled, these types can be exported to
//! TypeScript using ts-rs for consistency with the web frontend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Kind of control a field renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Currency,
    Date,
    Select,
    MultiSelect,
    Checkbox,
    Hidden,
    /// Household picker backed by the household directory
    Household,
    /// Roster of family memberships
    FamilyMemberships,
}

impl FieldType {
    /// Whether values of this type must parse as a number.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Currency)
    }

    /// Whether the field offers a list of options to choose from.
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

/// Horizontal span of a field within a two-unit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ColSpan {
    Half,
    #[default]
    Full,
    Third,
}

impl ColSpan {
    /// Column units consumed in a row.
    pub fn units(&self) -> u8 {
        match self {
            Self::Half | Self::Third => 1,
            Self::Full => 2,
        }
    }
}

/// One selectable option. `value` is the identity; `label` is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FormFieldOption {
    pub label: String,
    pub value: String,
}

impl FormFieldOption {
    /// Create an option from its value and display label.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Condition deciding whether a field renders, based on another field's value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    /// Name of the watched field
    pub field: String,
    /// Visible when the watched value strictly equals this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    /// Visible when the watched value is truthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_truthy: Option<bool>,
    /// Visible when the watched value is falsy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_falsy: Option<bool>,
}

impl VisibilityCondition {
    /// Visible when `field` strictly equals `value`.
    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            equals: Some(value),
            ..Default::default()
        }
    }

    /// Visible when `field` is truthy.
    pub fn truthy(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            is_truthy: Some(true),
            ..Default::default()
        }
    }

    /// Visible when `field` is falsy.
    pub fn falsy(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            is_falsy: Some(true),
            ..Default::default()
        }
    }
}

/// Reference to a backend action. Opaque to the engine apart from `handler`,
/// which is only used for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Handler identifier, e.g. `families.quickCreate`
    pub handler: String,
    /// Handler-specific configuration, passed through untouched
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

impl ActionDescriptor {
    /// Create a descriptor with no configuration.
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            config: Value::Null,
        }
    }

    /// Attach handler configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

/// Inline creation of a new option for a lookup field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct QuickCreateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Action to execute; synthesized from the field's lookup when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDescriptor>,
}

/// Declarative description of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Unique key within one form
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub col_span: ColSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibilityCondition>,
    /// Source field whose slug this field tracks until edited by hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derive_slug_from: Option<String>,
    /// External option source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FormFieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_create: Option<QuickCreateConfig>,
}

impl FieldSchema {
    /// Create a field with the given name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            placeholder: None,
            helper_text: None,
            required: false,
            col_span: ColSpan::default(),
            visible_when: None,
            derive_slug_from: None,
            lookup_id: None,
            options: Vec::new(),
            quick_create: None,
        }
    }

    /// Shorthand for a plain text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// Shorthand for a select field.
    pub fn select(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Select)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_helper_text(mut self, text: impl Into<String>) -> Self {
        self.helper_text = Some(text.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_span(mut self, span: ColSpan) -> Self {
        self.col_span = span;
        self
    }

    pub fn visible_when(mut self, condition: VisibilityCondition) -> Self {
        self.visible_when = Some(condition);
        self
    }

    pub fn derive_slug_from(mut self, source: impl Into<String>) -> Self {
        self.derive_slug_from = Some(source.into());
        self
    }

    pub fn with_lookup(mut self, lookup_id: impl Into<String>) -> Self {
        self.lookup_id = Some(lookup_id.into());
        self
    }

    pub fn with_options(mut self, options: Vec<FormFieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_quick_create(mut self, quick_create: QuickCreateConfig) -> Self {
        self.quick_create = Some(quick_create);
        self
    }

    /// Whether the field carries non-empty helper text.
    pub fn has_helper_text(&self) -> bool {
        self.helper_text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Display label, falling back to the field name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}
