//! Visibility tracking.
//!
//! Only fields whose visibility depends on another field are watched;
//! unconditional fields are always visible and cost nothing.

use std::collections::HashMap;

use tracing::trace;

use form_schema::{is_visible, FieldSchema, VisibilityCondition};

use crate::reactor::FieldReactor;
use crate::store::FormValueStore;
use crate::types::{FieldWrite, ValueChange};

/// Current visibility of conditionally displayed fields.
#[derive(Debug, Clone, Default)]
pub struct VisibilityWatcher {
    conditions: HashMap<String, VisibilityCondition>,
    dependents: HashMap<String, Vec<String>>,
    visible: HashMap<String, bool>,
}

impl VisibilityWatcher {
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a FieldSchema>,
    {
        let mut watcher = Self::default();
        for field in fields {
            if let Some(condition) = &field.visible_when {
                watcher
                    .dependents
                    .entry(condition.field.clone())
                    .or_default()
                    .push(field.name.clone());
                watcher.conditions.insert(field.name.clone(), condition.clone());
            }
        }
        watcher
    }

    /// Evaluate every condition against the store.
    pub fn refresh(&mut self, store: &FormValueStore) {
        for (name, condition) in &self.conditions {
            self.visible
                .insert(name.clone(), is_visible(Some(condition), store.get(&condition.field)));
        }
    }

    /// Whether `field` is currently shown. Unconditional fields always are.
    pub fn is_visible(&self, field: &str) -> bool {
        self.visible.get(field).copied().unwrap_or(true)
    }

    /// Number of fields being watched.
    pub fn watched_count(&self) -> usize {
        self.dependents.len()
    }
}

impl FieldReactor for VisibilityWatcher {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn watches(&self, field: &str) -> bool {
        self.dependents.contains_key(field)
    }

    fn react(&mut self, change: &ValueChange, _store: &FormValueStore) -> Vec<FieldWrite> {
        let Some(dependents) = self.dependents.get(&change.field) else {
            return Vec::new();
        };
        for name in dependents {
            if let Some(condition) = self.conditions.get(name) {
                let shown = is_visible(Some(condition), Some(&change.value));
                trace!(field = %name, visible = shown, "Visibility updated");
                self.visible.insert(name.clone(), shown);
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::dispatch;
    use crate::types::WriteOrigin;
    use serde_json::json;

    fn fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("isMember", form_schema::FieldType::Checkbox),
            FieldSchema::text("memberSince").visible_when(VisibilityCondition::truthy("isMember")),
            FieldSchema::text("notes"),
        ]
    }

    #[test]
    fn test_unconditional_fields_not_watched() {
        let watcher = VisibilityWatcher::from_fields(&fields());
        assert_eq!(watcher.watched_count(), 1);
        assert!(!watcher.watches("notes"));
        assert!(watcher.is_visible("notes"));
    }

    #[test]
    fn test_visibility_follows_watched_value() {
        let mut watcher = VisibilityWatcher::from_fields(&fields());
        let mut store = FormValueStore::from_value(json!({ "isMember": false }));
        watcher.refresh(&store);
        assert!(!watcher.is_visible("memberSince"));

        dispatch(
            &mut store,
            &mut [&mut watcher],
            vec![FieldWrite::new("isMember", json!(true), WriteOrigin::User)],
            8,
        );
        assert!(watcher.is_visible("memberSince"));
    }
}
