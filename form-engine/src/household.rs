//! Household directory reconciliation.
//!
//! A person form binds to a household from the directory. Selecting one
//! copies its id and name into the form, fills envelope number and address
//! subfields only where the form is still empty, and keeps the household
//! roster in step with the person's own name.
//!
//! Households without a durable id get a synthetic key derived from their
//! normalized name so they can still be selected and merged.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use form_actions::{ActionError, DirectoryQuery, HouseholdRow};

use crate::config::HouseholdBindings;
use crate::reactor::FieldReactor;
use crate::store::FormValueStore;
use crate::types::{is_empty_value, FieldWrite, FormError, Result, ValueChange, WriteOrigin};

/// Default prefix of synthetic household keys.
pub const SYNTHETIC_KEY_PREFIX: &str = "name:";

/// Postal address of a household or family.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl HouseholdAddress {
    /// Subfields in street, city, state, postal code order.
    pub fn parts(&self) -> [Option<&str>; 4] {
        [
            self.street.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.parts().iter().all(|p| p.map(|s| s.trim().is_empty()).unwrap_or(true))
    }

    /// Read an address back out of the form.
    pub fn from_store(store: &FormValueStore, bindings: &HouseholdBindings) -> Self {
        let [street, city, state, postal_code] = bindings.address_fields().map(|f| non_blank(store.text(f)));
        Self {
            street,
            city,
            state,
            postal_code,
        }
    }

    /// Writes for every subfield the form has left empty.
    pub fn fill_empty(
        &self,
        store: &FormValueStore,
        bindings: &HouseholdBindings,
        origin: WriteOrigin,
    ) -> Vec<FieldWrite> {
        bindings
            .address_fields()
            .into_iter()
            .zip(self.parts())
            .filter_map(|(field, part)| {
                let part = part.filter(|p| !p.trim().is_empty())?;
                store
                    .is_empty(field)
                    .then(|| FieldWrite::new(field, Value::String(part.to_string()), origin))
            })
            .collect()
    }
}

/// A selectable household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdOption {
    /// Real id, or synthetic key when the household has none
    pub key: String,
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub envelope_number: Option<String>,
    pub address: Option<HouseholdAddress>,
}

impl HouseholdOption {
    pub fn from_row(row: HouseholdRow, prefix: &str) -> Self {
        let address = HouseholdAddress {
            street: row.address_street,
            city: row.address_city,
            state: row.address_state,
            postal_code: row.address_postal_code,
        };
        Self {
            key: build_household_key_with_prefix(row.id.as_deref().unwrap_or(""), &row.name, prefix),
            id: row.id.filter(|id| !id.trim().is_empty()),
            name: row.name.trim().to_string(),
            members: dedupe_names(row.member_names),
            envelope_number: row.envelope_number,
            address: (!address.is_empty()).then_some(address),
        }
    }

    /// Whether the key is synthetic.
    pub fn is_synthetic(&self) -> bool {
        self.id.is_none()
    }
}

/// Lowercased, trimmed household name.
pub fn normalize_household_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Key of a household: its id when non-empty, else `name:` plus the
/// normalized name.
///
/// ```
/// use form_engine::household::build_household_key;
///
/// assert_eq!(build_household_key("", "The Smiths"), "name:the smiths");
/// assert_eq!(build_household_key("42", "Anything"), "42");
/// ```
pub fn build_household_key(id: &str, name: &str) -> String {
    build_household_key_with_prefix(id, name, SYNTHETIC_KEY_PREFIX)
}

pub fn build_household_key_with_prefix(id: &str, name: &str, prefix: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        format!("{}{}", prefix, normalize_household_name(name))
    } else {
        id.to_string()
    }
}

/// Trim names, drop blanks and remove case-insensitive duplicates, keeping
/// the first spelling seen.
pub fn dedupe_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    out
}

/// Merge a fresh directory listing into the current options.
///
/// Incoming fields override previous ones when present; previous members
/// and address survive when the incoming entry has none. The result is
/// sorted by name, case-insensitively, then by key.
pub fn merge_household_options(
    previous: &[HouseholdOption],
    incoming: &[HouseholdOption],
) -> Vec<HouseholdOption> {
    let mut merged: BTreeMap<String, HouseholdOption> = previous
        .iter()
        .map(|option| (option.key.clone(), option.clone()))
        .collect();

    for option in incoming {
        match merged.get_mut(&option.key) {
            Some(existing) => {
                let conflicting_address = existing.address.is_some()
                    && option.address.is_some()
                    && existing.address != option.address;
                if existing.is_synthetic() && conflicting_address {
                    debug!(
                        household_key = %option.key,
                        "Households without ids share a name but have different addresses"
                    );
                }
                if option.id.is_some() {
                    existing.id = option.id.clone();
                }
                if !option.name.is_empty() {
                    existing.name = option.name.clone();
                }
                if !option.members.is_empty() {
                    existing.members = option.members.clone();
                }
                if option.envelope_number.is_some() {
                    existing.envelope_number = option.envelope_number.clone();
                }
                if option.address.is_some() {
                    existing.address = option.address.clone();
                }
            }
            None => {
                merged.insert(option.key.clone(), option.clone());
            }
        }
    }

    let mut options: Vec<HouseholdOption> = merged.into_values().collect();
    options.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.key.cmp(&b.key))
    });
    options
}

/// "First Last", trimmed; either part may be blank.
pub fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

/// Roster for the form: the household's members plus the person's own
/// name, deduplicated. Without a household, just the own name.
pub fn compute_roster(selected: Option<&HouseholdOption>, own_name: &str) -> Vec<String> {
    let members = selected.map(|h| h.members.as_slice()).unwrap_or(&[]);
    dedupe_names(members.iter().map(String::as_str).chain(std::iter::once(own_name)))
}

/// Directory state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryStatus {
    /// Nothing requested yet
    Idle,
    Loading,
    Ready,
    /// Directory failed; household fields are free text
    ManualEntry,
}

/// Ticket for one directory request. Only the latest one is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRequest {
    pub seq: u64,
    pub query: DirectoryQuery,
}

/// What happened to a completed directory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Options were merged; carries the option count
    Applied(usize),
    /// A newer request was issued first; result dropped
    Stale,
    /// Request failed; `first` is true the first time this happens
    Degraded { first: bool },
}

/// Keeps household fields consistent with the selected household.
#[derive(Debug, Clone)]
pub struct HouseholdReconciler {
    bindings: HouseholdBindings,
    options: Vec<HouseholdOption>,
    selected_key: Option<String>,
    status: DirectoryStatus,
    latest_request: u64,
    degraded_once: bool,
    enabled: bool,
}

impl HouseholdReconciler {
    pub fn new(bindings: HouseholdBindings) -> Self {
        Self {
            bindings,
            options: Vec::new(),
            selected_key: None,
            status: DirectoryStatus::Idle,
            latest_request: 0,
            degraded_once: false,
            enabled: true,
        }
    }

    /// Turn reconciliation off for forms without household fields.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bindings(&self) -> &HouseholdBindings {
        &self.bindings
    }

    pub fn options(&self) -> &[HouseholdOption] {
        &self.options
    }

    pub fn status(&self) -> DirectoryStatus {
        self.status
    }

    /// Whether household fields should render as free text.
    pub fn is_manual_entry(&self) -> bool {
        self.status == DirectoryStatus::ManualEntry
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected_key.as_deref()
    }

    pub fn selected(&self) -> Option<&HouseholdOption> {
        let key = self.selected_key.as_deref()?;
        self.options.iter().find(|o| o.key == key)
    }

    /// Seed the option list from a record being edited.
    ///
    /// The record's household appears as a single option so it stays
    /// selectable before (or without) the directory. Returns true if an
    /// option was synthesized.
    pub fn seed_from_store(&mut self, store: &FormValueStore) -> bool {
        let id = store.text(&self.bindings.household_id);
        let name = store.text(&self.bindings.household_name);
        if id.trim().is_empty() && name.trim().is_empty() {
            return false;
        }

        let members = match store.get(&self.bindings.members) {
            Some(Value::Array(items)) => dedupe_names(items.iter().filter_map(Value::as_str)),
            _ => Vec::new(),
        };
        let address = HouseholdAddress::from_store(store, &self.bindings);
        let option = HouseholdOption {
            key: build_household_key_with_prefix(&id, &name, &self.bindings.synthetic_key_prefix),
            id: non_blank(id),
            name: name.trim().to_string(),
            members,
            envelope_number: non_blank(store.text(&self.bindings.envelope_number)),
            address: (!address.is_empty()).then_some(address),
        };

        if option.id.is_some() {
            self.selected_key = Some(option.key.clone());
        }
        debug!(household_key = %option.key, "Seeded household option from record");
        self.options = merge_household_options(&self.options, std::slice::from_ref(&option));
        true
    }

    /// Re-derive the selection after the form's values were replaced.
    /// Directory options are kept.
    pub fn remount(&mut self, store: &FormValueStore) {
        self.selected_key = None;
        self.seed_from_store(store);
    }

    /// Start a directory request; any earlier request becomes stale.
    pub fn begin_fetch(&mut self, query: DirectoryQuery) -> DirectoryRequest {
        self.latest_request += 1;
        if self.status != DirectoryStatus::ManualEntry {
            self.status = DirectoryStatus::Loading;
        }
        DirectoryRequest {
            seq: self.latest_request,
            query,
        }
    }

    /// Apply the result of `request` unless a newer request exists.
    pub fn complete_fetch(
        &mut self,
        request: &DirectoryRequest,
        result: std::result::Result<Vec<HouseholdRow>, ActionError>,
    ) -> FetchOutcome {
        if request.seq != self.latest_request {
            debug!(
                request_seq = request.seq,
                latest = self.latest_request,
                query = %request.query.key(),
                "Dropping stale household listing"
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(rows) => {
                let incoming: Vec<HouseholdOption> = rows
                    .into_iter()
                    .map(|row| HouseholdOption::from_row(row, &self.bindings.synthetic_key_prefix))
                    .collect();
                self.options = merge_household_options(&self.options, &incoming);
                self.status = DirectoryStatus::Ready;
                info!(
                    request_seq = request.seq,
                    query = %request.query.key(),
                    options = self.options.len(),
                    "Loaded household listing"
                );
                FetchOutcome::Applied(self.options.len())
            }
            Err(err) => {
                let first = !self.degraded_once;
                self.degraded_once = true;
                self.status = DirectoryStatus::ManualEntry;
                if first {
                    warn!(error = %err, "Household directory unavailable; switching to manual entry");
                }
                FetchOutcome::Degraded { first }
            }
        }
    }

    /// Writes for selecting the household with `key`.
    pub fn select(&mut self, key: &str, store: &FormValueStore) -> Result<Vec<FieldWrite>> {
        let option = self
            .options
            .iter()
            .find(|o| o.key == key)
            .cloned()
            .ok_or_else(|| FormError::UnknownHousehold(key.to_string()))?;
        self.selected_key = Some(option.key.clone());

        let b = &self.bindings;
        let origin = WriteOrigin::Reconciled;
        let mut writes = vec![
            FieldWrite::new(
                &b.household_id,
                option.id.clone().map(Value::String).unwrap_or(Value::Null),
                origin,
            ),
            FieldWrite::new(&b.household_name, Value::String(option.name.clone()), origin),
        ];

        if let Some(envelope) = option.envelope_number.as_ref().filter(|_| store.is_empty(&b.envelope_number)) {
            writes.push(FieldWrite::new(&b.envelope_number, Value::String(envelope.clone()), origin));
        }
        if let Some(address) = &option.address {
            writes.extend(address.fill_empty(store, b, origin));
        }
        writes.extend(self.roster_write(store));

        debug!(household_key = %option.key, writes = writes.len(), "Selected household");
        Ok(writes)
    }

    /// Writes for the user typing a household name by hand.
    ///
    /// Typing a different name detaches the form from the selected
    /// household.
    pub fn detach_for_manual_name(&mut self, store: &FormValueStore) -> Vec<FieldWrite> {
        let has_id = !is_empty_value(store.get(&self.bindings.household_id));
        if self.selected_key.is_none() && !has_id {
            return Vec::new();
        }

        self.selected_key = None;
        let mut writes = Vec::new();
        if has_id {
            writes.push(FieldWrite::new(&self.bindings.household_id, Value::Null, WriteOrigin::Reconciled));
        }
        writes.extend(self.roster_write(store));
        writes
    }

    /// Roster write for the current selection, if the stored roster differs.
    pub fn roster_write(&self, store: &FormValueStore) -> Option<FieldWrite> {
        let own = full_name(
            &store.text(&self.bindings.first_name),
            &store.text(&self.bindings.last_name),
        );
        let roster = compute_roster(self.selected(), &own);
        if roster == stored_roster(store, &self.bindings.members) {
            return None;
        }
        Some(FieldWrite::new(
            &self.bindings.members,
            Value::Array(roster.into_iter().map(Value::String).collect()),
            WriteOrigin::Reconciled,
        ))
    }

    fn sync_selection_to_id(&mut self, id: &str) -> bool {
        if id.is_empty() {
            self.selected_key = None;
            return true;
        }
        if self.options.iter().any(|o| o.key == id) {
            self.selected_key = Some(id.to_string());
            return true;
        }
        debug!(household_id = %id, "Household id not in directory listing");
        false
    }
}

impl FieldReactor for HouseholdReconciler {
    fn name(&self) -> &'static str {
        "household"
    }

    fn watches(&self, field: &str) -> bool {
        self.enabled
            && (field == self.bindings.household_id
                || field == self.bindings.first_name
                || field == self.bindings.last_name)
    }

    fn react(&mut self, change: &ValueChange, store: &FormValueStore) -> Vec<FieldWrite> {
        if change.field == self.bindings.household_id && change.origin != WriteOrigin::Reconciled {
            let id = store.text(&self.bindings.household_id);
            if !self.sync_selection_to_id(id.trim()) {
                return Vec::new();
            }
        }
        self.roster_write(store).into_iter().collect()
    }
}

fn stored_roster(store: &FormValueStore, field: &str) -> Vec<String> {
    match store.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::dispatch;
    use serde_json::json;

    fn smiths() -> HouseholdOption {
        HouseholdOption {
            key: "h-1".to_string(),
            id: Some("h-1".to_string()),
            name: "The Smiths".to_string(),
            members: vec!["Ann Smith".to_string(), "Bob Smith".to_string()],
            envelope_number: Some("204".to_string()),
            address: Some(HouseholdAddress {
                street: Some("123 Main".to_string()),
                city: Some("Springfield".to_string()),
                state: Some("IL".to_string()),
                postal_code: Some("62701".to_string()),
            }),
        }
    }

    fn reconciler_with(options: Vec<HouseholdOption>) -> HouseholdReconciler {
        let mut reconciler = HouseholdReconciler::new(HouseholdBindings::default());
        reconciler.options = options;
        reconciler
    }

    fn apply(
        reconciler: &mut HouseholdReconciler,
        store: &mut FormValueStore,
        writes: Vec<FieldWrite>,
    ) {
        dispatch(store, &mut [reconciler], writes, 32);
    }

    #[test]
    fn test_household_keys() {
        assert_eq!(build_household_key("", "The Smiths"), "name:the smiths");
        assert_eq!(build_household_key("  ", "  The SMITHS "), "name:the smiths");
        assert_eq!(build_household_key("42", "Anything"), "42");
    }

    #[test]
    fn test_merge_keeps_previous_members() {
        let previous = vec![smiths()];
        let incoming = vec![HouseholdOption {
            members: Vec::new(),
            envelope_number: Some("205".to_string()),
            ..smiths()
        }];

        let merged = merge_household_options(&previous, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].members.len(), 2);
        assert_eq!(merged[0].envelope_number.as_deref(), Some("205"));
    }

    #[test]
    fn test_merge_sorts_case_insensitively() {
        let garcia = HouseholdOption {
            key: "name:garcia".to_string(),
            id: None,
            name: "garcia".to_string(),
            members: Vec::new(),
            envelope_number: None,
            address: None,
        };
        let merged = merge_household_options(&[smiths()], &[garcia]);
        let names: Vec<&str> = merged.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["garcia", "The Smiths"]);
    }

    #[test]
    fn test_roster_dedupes_case_insensitively() {
        let roster = compute_roster(Some(&smiths()), "ann smith");
        assert_eq!(roster, vec!["Ann Smith", "Bob Smith"]);
        assert_eq!(compute_roster(None, "Carol Jones"), vec!["Carol Jones"]);
        assert!(compute_roster(None, "").is_empty());
    }

    #[test]
    fn test_select_fills_only_empty_fields() {
        let mut reconciler = reconciler_with(vec![smiths()]);
        let mut store = FormValueStore::from_value(json!({
            "firstName": "Carol",
            "lastName": "Smith",
            "addressStreet": "9 Elm",
            "envelopeNumber": "",
        }));

        let writes = reconciler.select("h-1", &store).unwrap();
        apply(&mut reconciler, &mut store, writes);

        assert_eq!(store.text("householdId"), "h-1");
        assert_eq!(store.text("householdName"), "The Smiths");
        assert_eq!(store.text("envelopeNumber"), "204");
        assert_eq!(store.text("addressStreet"), "9 Elm");
        assert_eq!(store.text("addressCity"), "Springfield");
        assert_eq!(
            store.get("householdMembers"),
            Some(&json!(["Ann Smith", "Bob Smith", "Carol Smith"]))
        );
    }

    #[test]
    fn test_name_change_updates_roster() {
        let mut reconciler = reconciler_with(vec![smiths()]);
        let mut store = FormValueStore::from_value(json!({ "firstName": "Carol", "lastName": "Smith" }));
        let writes = reconciler.select("h-1", &store).unwrap();
        apply(&mut reconciler, &mut store, writes);

        apply(
            &mut reconciler,
            &mut store,
            vec![FieldWrite::new("firstName", json!("Caroline"), WriteOrigin::User)],
        );
        assert_eq!(
            store.get("householdMembers"),
            Some(&json!(["Ann Smith", "Bob Smith", "Caroline Smith"]))
        );
    }

    #[test]
    fn test_manual_name_detaches_selection() {
        let mut reconciler = reconciler_with(vec![smiths()]);
        let mut store = FormValueStore::from_value(json!({ "firstName": "Carol", "lastName": "Smith" }));
        let writes = reconciler.select("h-1", &store).unwrap();
        apply(&mut reconciler, &mut store, writes);

        let mut writes = vec![FieldWrite::new("householdName", json!("Smith-Jones"), WriteOrigin::User)];
        writes.extend(reconciler.detach_for_manual_name(&store));
        apply(&mut reconciler, &mut store, writes);

        assert_eq!(store.get("householdId"), Some(&Value::Null));
        assert!(reconciler.selected().is_none());
        assert_eq!(store.get("householdMembers"), Some(&json!(["Carol Smith"])));
        assert_eq!(store.text("householdName"), "Smith-Jones");
    }

    #[test]
    fn test_unknown_household() {
        let mut reconciler = reconciler_with(Vec::new());
        let store = FormValueStore::from_value(json!({}));
        assert!(matches!(
            reconciler.select("nope", &store),
            Err(FormError::UnknownHousehold(_))
        ));
    }

    #[test]
    fn test_seed_synthesizes_option() {
        let mut reconciler = HouseholdReconciler::new(HouseholdBindings::default());
        let store = FormValueStore::from_value(json!({
            "householdId": "h-7",
            "householdName": "The Lees",
            "householdMembers": ["Kim Lee"],
        }));

        assert!(reconciler.seed_from_store(&store));
        assert_eq!(reconciler.options().len(), 1);
        assert_eq!(reconciler.selected_key(), Some("h-7"));
        assert_eq!(reconciler.selected().unwrap().members, vec!["Kim Lee"]);
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut reconciler = HouseholdReconciler::new(HouseholdBindings::default());
        let first = reconciler.begin_fetch(DirectoryQuery::search("smi"));
        let second = reconciler.begin_fetch(DirectoryQuery::search("smith"));

        let rows = vec![HouseholdRow {
            id: Some("h-1".to_string()),
            name: "The Smiths".to_string(),
            ..Default::default()
        }];
        assert_eq!(reconciler.complete_fetch(&second, Ok(rows)), FetchOutcome::Applied(1));
        assert_eq!(
            reconciler.complete_fetch(&first, Ok(Vec::new())),
            FetchOutcome::Stale
        );
        assert_eq!(reconciler.options().len(), 1);
        assert_eq!(reconciler.status(), DirectoryStatus::Ready);
    }

    #[test]
    fn test_failure_degrades_once() {
        let mut reconciler = HouseholdReconciler::new(HouseholdBindings::default());
        let request = reconciler.begin_fetch(DirectoryQuery::default());
        let err = ActionError::Unavailable("down".to_string());
        assert_eq!(
            reconciler.complete_fetch(&request, Err(err.clone())),
            FetchOutcome::Degraded { first: true }
        );
        let request = reconciler.begin_fetch(DirectoryQuery::default());
        assert_eq!(
            reconciler.complete_fetch(&request, Err(err)),
            FetchOutcome::Degraded { first: false }
        );
        assert!(reconciler.is_manual_entry());
    }
}
