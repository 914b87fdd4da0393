//! Lookup option registry.
//!
//! Option lists for lookup-backed fields come from three layers: the schema,
//! the directory service, and options created inline during this session.
//! Later layers never displace entries from earlier ones.

use std::collections::HashMap;

use tracing::debug;

use form_schema::{merge_option_layers, ActionDescriptor, FieldSchema, FormFieldOption};

use crate::config::QuickCreateSettings;

/// Fetched and learned options, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct LookupOptionRegistry {
    fetched: HashMap<String, Vec<FormFieldOption>>,
    learned: HashMap<String, Vec<FormFieldOption>>,
}

impl LookupOptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the directory-provided options for `field`.
    pub fn set_fetched(&mut self, field: impl Into<String>, options: Vec<FormFieldOption>) {
        self.fetched.insert(field.into(), options);
    }

    /// Record an option created during this session.
    ///
    /// Returns false if an option with the same value was already learned.
    pub fn learn(&mut self, field: impl Into<String>, option: FormFieldOption) -> bool {
        let field = field.into();
        let learned = self.learned.entry(field.clone()).or_default();
        if learned.iter().any(|o| o.value == option.value) {
            return false;
        }
        debug!(field = %field, value = %option.value, "Learned lookup option");
        learned.push(option);
        true
    }

    pub fn learned(&self, field: &str) -> &[FormFieldOption] {
        self.learned.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fetched(&self, field: &str) -> &[FormFieldOption] {
        self.fetched.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Effective option list of `field`: schema, then fetched, then learned.
    pub fn options_for(&self, field: &FieldSchema) -> Vec<FormFieldOption> {
        merge_option_layers([
            field.options.as_slice(),
            self.fetched(&field.name),
            self.learned(&field.name),
        ])
    }

    /// Drop fetched options; learned options are kept.
    pub fn clear_fetched(&mut self) {
        self.fetched.clear();
    }
}

/// Copy of `field` as the renderer should see it.
///
/// Options are merged across all layers. A lookup field whose quick-create
/// carries no action gets the default lookup-create handler, configured with
/// its lookup id.
pub fn augment_field(
    field: &FieldSchema,
    registry: &LookupOptionRegistry,
    settings: &QuickCreateSettings,
) -> FieldSchema {
    let mut augmented = field.clone();
    augmented.options = registry.options_for(field);

    if let (Some(lookup_id), Some(quick_create)) = (&field.lookup_id, augmented.quick_create.as_mut()) {
        if quick_create.action.is_none() {
            quick_create.action = Some(
                ActionDescriptor::new(settings.default_handler.clone())
                    .with_config(serde_json::json!({ "lookupId": lookup_id })),
            );
        }
    }
    augmented
}
