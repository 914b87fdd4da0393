//! Field reactors and write dispatch.
//!
//! A reactor watches a set of fields and answers each committed change with
//! follow-up writes. Dispatch is breadth-first: writes queue in the order
//! reactors produce them, so the first write in a cascade commits before the
//! writes it causes.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::store::FormValueStore;
use crate::types::{FieldWrite, ValueChange};

/// Synchronous observer of committed field changes.
pub trait FieldReactor {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether changes to `field` concern this reactor.
    fn watches(&self, field: &str) -> bool;

    /// Respond to a committed change with further writes.
    fn react(&mut self, change: &ValueChange, store: &FormValueStore) -> Vec<FieldWrite>;
}

/// Commit `writes` and every write they cascade into.
///
/// Stops after `max_writes` commits and drops the remainder of the queue.
/// Returns the committed changes in commit order.
pub fn dispatch(
    store: &mut FormValueStore,
    reactors: &mut [&mut dyn FieldReactor],
    writes: impl IntoIterator<Item = FieldWrite>,
    max_writes: usize,
) -> Vec<ValueChange> {
    dispatch_within(store, reactors, writes, max_writes, |_| true)
}

/// [`dispatch`] restricted to the fields `accepts` allows. Writes to any
/// other field are dropped before they reach the store.
pub fn dispatch_within<F>(
    store: &mut FormValueStore,
    reactors: &mut [&mut dyn FieldReactor],
    writes: impl IntoIterator<Item = FieldWrite>,
    max_writes: usize,
    accepts: F,
) -> Vec<ValueChange>
where
    F: Fn(&str) -> bool,
{
    let mut queue: VecDeque<FieldWrite> = writes.into_iter().collect();
    let mut committed = Vec::new();

    while let Some(write) = queue.pop_front() {
        if !accepts(&write.field) {
            debug!(field = %write.field, origin = ?write.origin, "Dropping write to undeclared field");
            continue;
        }
        if committed.len() >= max_writes {
            warn!(
                limit = max_writes,
                dropped = queue.len() + 1,
                field = %write.field,
                "Write cascade exceeded limit"
            );
            break;
        }

        let field = write.field.clone();
        let Some(change) = store.commit(write) else {
            debug!(field = %field, "Write left value unchanged");
            continue;
        };

        for reactor in reactors.iter_mut() {
            if !reactor.watches(&change.field) {
                continue;
            }
            let follow_ups = reactor.react(&change, store);
            if !follow_ups.is_empty() {
                debug!(
                    reactor = reactor.name(),
                    field = %change.field,
                    writes = follow_ups.len(),
                    "Reactor produced writes"
                );
            }
            queue.extend(follow_ups);
        }

        committed.push(change);
    }

    committed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WriteOrigin;
    use serde_json::{json, Value};

    /// Copies `from` into `to`, appending a suffix.
    struct Echo {
        from: &'static str,
        to: &'static str,
    }

    impl FieldReactor for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn watches(&self, field: &str) -> bool {
            field == self.from
        }

        fn react(&mut self, change: &ValueChange, _store: &FormValueStore) -> Vec<FieldWrite> {
            let text = change.value.as_str().unwrap_or_default();
            vec![FieldWrite::new(
                self.to,
                Value::String(format!("{}!", text)),
                WriteOrigin::Derived,
            )]
        }
    }

    #[test]
    fn test_cascade_commits_in_order() {
        let mut store = FormValueStore::from_value(json!({}));
        let mut a = Echo { from: "a", to: "b" };
        let mut b = Echo { from: "b", to: "c" };

        let changes = dispatch(
            &mut store,
            &mut [&mut a, &mut b],
            vec![FieldWrite::new("a", json!("x"), WriteOrigin::User)],
            16,
        );

        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
        assert_eq!(store.get("c"), Some(&json!("x!!")));
    }

    #[test]
    fn test_cycle_stops_at_limit() {
        let mut store = FormValueStore::from_value(json!({}));
        let mut a = Echo { from: "a", to: "b" };
        let mut b = Echo { from: "b", to: "a" };

        let changes = dispatch(
            &mut store,
            &mut [&mut a, &mut b],
            vec![FieldWrite::new("a", json!("x"), WriteOrigin::User)],
            5,
        );
        assert_eq!(changes.len(), 5);
    }

    #[test]
    fn test_writes_outside_accepted_fields_are_dropped() {
        let mut store = FormValueStore::from_value(json!({}));
        let mut a = Echo { from: "a", to: "b" };
        let mut b = Echo { from: "b", to: "c" };

        let changes = dispatch_within(
            &mut store,
            &mut [&mut a, &mut b],
            vec![FieldWrite::new("a", json!("x"), WriteOrigin::User)],
            16,
            |field| field != "b",
        );

        assert_eq!(changes.len(), 1);
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_none());
    }
}
