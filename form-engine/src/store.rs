//! Live field-value store.
//!
//! Holds the current value of every field, the set of fields the user has
//! typed into, and dirty tracking against the initial values. Observers
//! subscribe per field (or to every field) and are called after each
//! committed write, in commit order.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::types::{is_empty_value, value_text, FieldWrite, ValueChange, WriteOrigin};

/// Handle returned by [`FormValueStore::subscribe`].
pub type SubscriptionId = u64;

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Field(String),
    Any,
}

impl Topic {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    fn matches(&self, field: &str) -> bool {
        match self {
            Self::Field(name) => name == field,
            Self::Any => true,
        }
    }
}

type Listener = Box<dyn FnMut(&ValueChange) + Send>;

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    listener: Listener,
}

/// Mapping from field name to current value.
pub struct FormValueStore {
    values: Map<String, Value>,
    initial: Map<String, Value>,
    manually_edited: HashSet<String>,
    dirty: HashSet<String>,
    subscriptions: Vec<Subscription>,
    next_subscription: SubscriptionId,
}

impl FormValueStore {
    /// Create a store seeded with `initial` values.
    pub fn new(initial: Map<String, Value>) -> Self {
        Self {
            values: initial.clone(),
            initial,
            manually_edited: HashSet::new(),
            dirty: HashSet::new(),
            subscriptions: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Create a store from a JSON object; any other value yields an empty store.
    pub fn from_value(initial: Value) -> Self {
        match initial {
            Value::Object(map) => Self::new(map),
            _ => Self::new(Map::new()),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Text content of a field (numbers rendered, other kinds empty).
    pub fn text(&self, field: &str) -> String {
        value_text(self.values.get(field))
    }

    /// Whether a field is null, missing, blank or an empty list.
    pub fn is_empty(&self, field: &str) -> bool {
        is_empty_value(self.values.get(field))
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn initial_values(&self) -> &Map<String, Value> {
        &self.initial
    }

    /// Full copy of the current values.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Apply one write.
    ///
    /// User writes mark the field as manually edited even when the value is
    /// unchanged. Writes that do not change the stored value commit nothing
    /// and notify nobody.
    pub fn commit(&mut self, write: FieldWrite) -> Option<ValueChange> {
        if write.origin == WriteOrigin::User {
            self.manually_edited.insert(write.field.clone());
        }

        let current = self.values.get(&write.field);
        let unchanged = match current {
            Some(existing) => existing == &write.value,
            None => write.value.is_null(),
        };
        if unchanged {
            return None;
        }

        let previous = self.values.insert(write.field.clone(), write.value.clone());
        self.update_dirty(&write.field);

        let change = ValueChange {
            field: write.field,
            previous,
            value: write.value,
            origin: write.origin,
        };
        self.notify(&change);
        Some(change)
    }

    /// Register a listener; it fires after every committed write to `topic`.
    pub fn subscribe<F>(&mut self, topic: Topic, listener: F) -> SubscriptionId
    where
        F: FnMut(&ValueChange) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscriptions.push(Subscription {
            id,
            topic,
            listener: Box::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn mark_manually_edited(&mut self, field: impl Into<String>) {
        self.manually_edited.insert(field.into());
    }

    pub fn is_manually_edited(&self, field: &str) -> bool {
        self.manually_edited.contains(field)
    }

    /// Whether `field` differs from its initial value.
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Whether any field differs from its initial value.
    pub fn is_form_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Restore the initial values (or replace them) and forget edit history.
    ///
    /// Subscribers are notified for every field whose value changes.
    pub fn reset(&mut self, replacement: Option<Map<String, Value>>) -> Vec<ValueChange> {
        if let Some(initial) = replacement {
            self.initial = initial;
        }

        let mut fields: Vec<String> = self.values.keys().cloned().collect();
        fields.extend(self.initial.keys().filter(|k| !self.values.contains_key(*k)).cloned());

        let previous = std::mem::replace(&mut self.values, self.initial.clone());
        self.manually_edited.clear();
        self.dirty.clear();

        let mut changes = Vec::new();
        for field in fields {
            let before = previous.get(&field).cloned();
            let after = self.values.get(&field).cloned().unwrap_or(Value::Null);
            if before.as_ref().unwrap_or(&Value::Null) == &after {
                continue;
            }
            let change = ValueChange {
                field,
                previous: before,
                value: after,
                origin: WriteOrigin::Programmatic,
            };
            self.notify(&change);
            changes.push(change);
        }
        changes
    }

    fn update_dirty(&mut self, field: &str) {
        let initial = self.initial.get(field).unwrap_or(&Value::Null);
        let current = self.values.get(field).unwrap_or(&Value::Null);
        if initial == current {
            self.dirty.remove(field);
        } else {
            self.dirty.insert(field.to_string());
        }
    }

    fn notify(&mut self, change: &ValueChange) {
        for subscription in self.subscriptions.iter_mut() {
            if subscription.topic.matches(&change.field) {
                (subscription.listener)(change);
            }
        }
    }
}

impl fmt::Debug for FormValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormValueStore")
            .field("values", &self.values)
            .field("manually_edited", &self.manually_edited)
            .field("dirty", &self.dirty)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
