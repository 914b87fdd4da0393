//! Slug derivation between fields.
//!
//! A field declaring `deriveSlugFrom: source` follows the slug of its source
//! until the user types into it. After that the field is left alone.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use form_schema::{slugify_with_limit, FieldSchema};

use crate::reactor::FieldReactor;
use crate::store::FormValueStore;
use crate::types::{value_text, FieldWrite, ValueChange, WriteOrigin};

/// Keeps derived fields in step with their sources.
#[derive(Debug, Clone, Default)]
pub struct DerivationEngine {
    targets_by_source: HashMap<String, Vec<String>>,
    max_len: usize,
}

impl DerivationEngine {
    /// Collect derivation links from `fields`.
    pub fn from_fields<'a, I>(fields: I, max_len: usize) -> Self
    where
        I: IntoIterator<Item = &'a FieldSchema>,
    {
        let mut targets_by_source: HashMap<String, Vec<String>> = HashMap::new();
        for field in fields {
            if let Some(source) = &field.derive_slug_from {
                targets_by_source
                    .entry(source.clone())
                    .or_default()
                    .push(field.name.clone());
            }
        }
        Self {
            targets_by_source,
            max_len,
        }
    }

    /// Whether any field derives from another.
    pub fn is_empty(&self) -> bool {
        self.targets_by_source.is_empty()
    }

    /// Fields derived from `source`, in declaration order.
    pub fn targets_of(&self, source: &str) -> &[String] {
        self.targets_by_source
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Protect derived fields that already hold a value when the form mounts.
    pub fn protect_existing(&self, store: &mut FormValueStore) {
        let populated: Vec<String> = self
            .targets_by_source
            .values()
            .flatten()
            .filter(|target| !store.is_empty(target))
            .cloned()
            .collect();
        for target in populated {
            debug!(field = %target, "Derived field has an initial value; not deriving");
            store.mark_manually_edited(target);
        }
    }
}

impl FieldReactor for DerivationEngine {
    fn name(&self) -> &'static str {
        "derivation"
    }

    fn watches(&self, field: &str) -> bool {
        self.targets_by_source.contains_key(field)
    }

    fn react(&mut self, change: &ValueChange, store: &FormValueStore) -> Vec<FieldWrite> {
        let slug = slugify_with_limit(&value_text(Some(&change.value)), self.max_len);
        self.targets_of(&change.field)
            .iter()
            .filter(|target| !store.is_manually_edited(target))
            .map(|target| FieldWrite::new(target.clone(), Value::String(slug.clone()), WriteOrigin::Derived))
            .collect()
    }
}
