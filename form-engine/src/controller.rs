//! FormController - one live form instance.
//!
//! Owns the value store and every reactor, and runs the three network
//! operations of a form: directory loads, quick-create and submission.
//! Each network operation is split into a `begin_*` step that validates and
//! marks the operation in flight, and a `finish_*`/`complete_*` step that
//! applies the result. The async convenience methods run both around a call
//! to the configured collaborator.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use form_actions::{
    ActionContext, ActionError, ActionExecutor, ActionRequest, ActionResponse, DirectoryClient,
    DirectoryQuery, HouseholdRow,
};
use form_schema::{
    group_fields_into_rows, ActionDescriptor, FieldRow, FieldSchema, FieldType, FormFieldOption,
    FormSchema, DEFAULT_TAB_ID,
};

use crate::config::EngineConfig;
use crate::derivation::DerivationEngine;
use crate::family::{created_family, FamilyOption, FamilyReconciler};
use crate::household::{
    DirectoryRequest, DirectoryStatus, FetchOutcome, HouseholdOption, HouseholdReconciler,
};
use crate::lookup::{augment_field, LookupOptionRegistry};
use crate::quick_create::{QuickCreateSession, QuickCreateSubmission};
use crate::reactor;
use crate::store::{FormValueStore, SubscriptionId, Topic};
use crate::types::{
    FieldError, FieldWrite, FormError, Notification, NotificationLevel, Result, ValueChange,
    WriteOrigin,
};
use crate::validation::check_field;
use crate::visibility::VisibilityWatcher;

type TabListener = Box<dyn FnMut(&str) + Send>;
type SubmitListener = Box<dyn FnMut(&ActionResponse) + Send>;

/// A submission that passed validation and is waiting on the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTicket {
    pub action: ActionDescriptor,
    pub request: ActionRequest,
}

/// One live form.
pub struct FormController {
    schema: FormSchema,
    config: EngineConfig,
    store: FormValueStore,
    derivation: DerivationEngine,
    visibility: VisibilityWatcher,
    household: HouseholdReconciler,
    family: FamilyReconciler,
    lookups: LookupOptionRegistry,
    executor: Option<Arc<dyn ActionExecutor>>,
    directory: Option<Arc<dyn DirectoryClient>>,
    quick_create: Option<QuickCreateSession>,
    submitting: bool,
    creating_family: Arc<AtomicBool>,
    field_errors: Vec<FieldError>,
    submit_error: Option<String>,
    notifications: Vec<Notification>,
    active_tab: String,
    on_tab_change: Option<TabListener>,
    on_submit_success: Option<SubmitListener>,
}

impl FormController {
    /// Mount a form with the default configuration.
    pub fn new(schema: FormSchema, initial_values: Value) -> Result<Self> {
        Self::mount(schema, initial_values, EngineConfig::default())
    }

    /// Mount a form: validate the schema, seed the store and wire reactors.
    pub fn mount(schema: FormSchema, initial_values: Value, config: EngineConfig) -> Result<Self> {
        let schema = schema.normalized();
        schema.validate()?;

        let mut store = FormValueStore::from_value(initial_values);
        let derivation = DerivationEngine::from_fields(schema.fields(), config.slug.max_len);
        derivation.protect_existing(&mut store);

        let mut visibility = VisibilityWatcher::from_fields(schema.fields());
        visibility.refresh(&store);

        let declares = |name: &str| schema.field(name).is_some();
        let bindings = &config.household;

        let mut household = HouseholdReconciler::new(bindings.clone());
        household.set_enabled(
            declares(&bindings.household_id)
                || declares(&bindings.household_name)
                || declares(&bindings.members),
        );
        if household.is_enabled() {
            household.seed_from_store(&store);
        }
        let mut family = FamilyReconciler::new(config.family.clone(), bindings.clone());
        family.set_enabled(declares(&config.family.memberships_field));

        let active_tab = schema
            .tab_ids()
            .first()
            .map(|id| id.to_string())
            .unwrap_or_else(|| DEFAULT_TAB_ID.to_string());

        info!(
            form_id = %schema.id,
            fields = schema.fields().count(),
            tabs = schema.tabs.len(),
            "Mounted form"
        );

        Ok(Self {
            schema,
            config,
            store,
            derivation,
            visibility,
            household,
            family,
            lookups: LookupOptionRegistry::new(),
            executor: None,
            directory: None,
            quick_create: None,
            submitting: false,
            creating_family: Arc::new(AtomicBool::new(false)),
            field_errors: Vec::new(),
            submit_error: None,
            notifications: Vec::new(),
            active_tab,
            on_tab_change: None,
            on_submit_success: None,
        })
    }

    /// Set the action-execution collaborator.
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the directory collaborator.
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FormValueStore {
        &self.store
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.store.get(field)
    }

    /// Copy of every current value.
    pub fn values(&self) -> Value {
        self.store.snapshot()
    }

    // --- Fields and layout ---

    /// Fields as the renderer should see them, with merged options and
    /// resolved quick-create actions.
    pub fn fields(&self) -> Vec<FieldSchema> {
        self.schema.fields().map(|f| self.augment(f)).collect()
    }

    /// One augmented field.
    pub fn field(&self, name: &str) -> Option<FieldSchema> {
        self.schema.field(name).map(|f| self.augment(f))
    }

    /// Effective options of a field.
    pub fn options(&self, name: &str) -> Vec<FormFieldOption> {
        self.schema
            .field(name)
            .map(|f| self.lookups.options_for(f))
            .unwrap_or_default()
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.visibility.is_visible(name)
    }

    /// Rows of the visible, non-hidden fields of a tab.
    pub fn rows<'a>(&'a self, tab_id: &'a str) -> Vec<FieldRow<'a>> {
        group_fields_into_rows(
            self.schema
                .fields_in_tab(tab_id)
                .filter(|f| f.field_type != FieldType::Hidden && self.visibility.is_visible(&f.name)),
        )
    }

    fn augment(&self, field: &FieldSchema) -> FieldSchema {
        augment_field(field, &self.lookups, &self.config.quick_create)
    }

    // --- Writes ---

    /// Apply a value typed by the user.
    ///
    /// Marks the field as manually edited and runs every reactor. Typing a
    /// household name detaches the form from the selected household.
    pub fn set_value(&mut self, field: &str, value: Value) -> Result<Vec<ValueChange>> {
        if self.schema.field(field).is_none() {
            return Err(FormError::UnknownField(field.to_string()));
        }

        let mut writes = vec![FieldWrite::new(field, value, WriteOrigin::User)];
        if field == self.config.household.household_name {
            writes.extend(self.household.detach_for_manual_name(&self.store));
        }
        Ok(self.apply(writes))
    }

    /// Apply a value set by the host application rather than the user.
    /// Fields the schema does not declare are ignored.
    pub fn set_value_programmatic(&mut self, field: &str, value: Value) -> Vec<ValueChange> {
        self.apply(vec![FieldWrite::new(field, value, WriteOrigin::Programmatic)])
    }

    pub fn mark_manually_edited(&mut self, field: &str) {
        self.store.mark_manually_edited(field);
    }

    pub fn is_manually_edited(&self, field: &str) -> bool {
        self.store.is_manually_edited(field)
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_form_dirty()
    }

    /// Subscribe to committed writes.
    pub fn subscribe<F>(&mut self, topic: Topic, listener: F) -> SubscriptionId
    where
        F: FnMut(&ValueChange) + Send + 'static,
    {
        self.store.subscribe(topic, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    fn apply(&mut self, writes: Vec<FieldWrite>) -> Vec<ValueChange> {
        let limit = self.config.general.max_cascade_depth;
        let schema = &self.schema;
        reactor::dispatch_within(
            &mut self.store,
            &mut [
                &mut self.derivation,
                &mut self.visibility,
                &mut self.household,
                &mut self.family,
            ],
            writes,
            limit,
            |field| schema.field(field).is_some(),
        )
    }

    // --- Validation, submit and reset ---

    /// Validate one field. Hidden and invisible fields always pass.
    pub fn validate_field(&self, name: &str) -> Result<()> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        match self.check(field) {
            Some(error) => Err(FormError::Validation(vec![error])),
            None => Ok(()),
        }
    }

    /// Validate every field, returning errors in declaration order.
    pub fn validate(&self) -> Vec<FieldError> {
        self.schema.fields().filter_map(|f| self.check(f)).collect()
    }

    fn check(&self, field: &FieldSchema) -> Option<FieldError> {
        if field.field_type == FieldType::Hidden || !self.visibility.is_visible(&field.name) {
            return None;
        }
        check_field(field, self.store.get(&field.name))
    }

    /// Errors from the last validation attempt.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Message of the last failed submission.
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Callback run after each successful submission.
    pub fn on_submit_success<F>(&mut self, callback: F)
    where
        F: FnMut(&ActionResponse) + Send + 'static,
    {
        self.on_submit_success = Some(Box::new(callback));
    }

    /// Validate and mark the submission in flight.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket> {
        if self.submitting {
            return Err(FormError::InFlight("Submission"));
        }

        let errors = self.validate();
        if !errors.is_empty() {
            debug!(form_id = %self.schema.id, errors = errors.len(), "Submission blocked by validation");
            self.field_errors = errors.clone();
            return Err(FormError::Validation(errors));
        }

        let action = self
            .schema
            .submit_action
            .clone()
            .ok_or_else(|| FormError::Config(format!("Form {} has no submit action", self.schema.id)))?;

        let mut context = ActionContext::new(self.schema.id.clone());
        let record_id = crate::types::value_text(self.store.initial_values().get("id"));
        if !record_id.is_empty() {
            context = context.with_record(record_id);
        }

        self.field_errors.clear();
        self.submit_error = None;
        self.submitting = true;
        Ok(SubmitTicket {
            action,
            request: ActionRequest::new(self.store.snapshot(), context),
        })
    }

    /// Apply the outcome of a submission. The store is left untouched.
    pub fn finish_submit(
        &mut self,
        ticket: &SubmitTicket,
        result: std::result::Result<ActionResponse, ActionError>,
    ) -> Result<ActionResponse> {
        self.submitting = false;
        match result.and_then(ActionResponse::into_result) {
            Ok(response) => {
                info!(
                    form_id = %self.schema.id,
                    handler = %ticket.action.handler,
                    "Form submitted"
                );
                if let Some(callback) = self.on_submit_success.as_mut() {
                    callback(&response);
                }
                Ok(response)
            }
            Err(err) => {
                warn!(
                    form_id = %self.schema.id,
                    handler = %ticket.action.handler,
                    error = %err,
                    "Form submission failed"
                );
                self.submit_error = Some(err.to_string());
                self.notify(NotificationLevel::Error, err.to_string());
                Err(FormError::Action(err))
            }
        }
    }

    /// Validate, execute the submit action and apply the outcome.
    pub async fn submit(&mut self) -> Result<ActionResponse> {
        let executor = self.executor()?;
        let ticket = self.begin_submit()?;
        let result = executor.execute(&ticket.action, ticket.request.clone()).await;
        self.finish_submit(&ticket, result)
    }

    /// Restore the initial values.
    pub fn reset(&mut self) {
        self.reset_inner(None);
    }

    /// Replace the initial values and restore them.
    pub fn reset_with(&mut self, initial_values: Value) {
        let values = match initial_values {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.reset_inner(Some(values));
    }

    fn reset_inner(&mut self, replacement: Option<serde_json::Map<String, Value>>) {
        let changed = self.store.reset(replacement);
        self.derivation.protect_existing(&mut self.store);
        self.visibility.refresh(&self.store);
        self.household.remount(&self.store);
        self.field_errors.clear();
        self.submit_error = None;
        if self.quick_create.as_ref().map(|s| !s.is_submitting()).unwrap_or(false) {
            self.quick_create = None;
        }
        debug!(form_id = %self.schema.id, changed = changed.len(), "Form reset");
    }

    // --- Tabs ---

    pub fn tab_ids(&self) -> Vec<&str> {
        self.schema.tab_ids()
    }

    pub fn active_tab(&self) -> &str {
        &self.active_tab
    }

    /// Switch tabs, notifying the tab-change callback.
    pub fn set_active_tab(&mut self, tab_id: &str) -> Result<()> {
        if !self.schema.tab_ids().contains(&tab_id) {
            return Err(FormError::UnknownTab(tab_id.to_string()));
        }
        if self.active_tab != tab_id {
            self.active_tab = tab_id.to_string();
            if let Some(callback) = self.on_tab_change.as_mut() {
                callback(tab_id);
            }
        }
        Ok(())
    }

    pub fn on_tab_change<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_tab_change = Some(Box::new(callback));
    }

    // --- Notifications ---

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
    }

    // --- Lookup options ---

    /// Fetch option lists for every lookup field concurrently.
    ///
    /// Returns the number of lookups loaded. Failures leave a field with its
    /// schema options and add one warning per lookup.
    pub async fn load_lookup_options(&mut self) -> usize {
        let Some(directory) = self.directory.clone() else {
            return 0;
        };

        let mut fields_by_lookup: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for field in self.schema.fields() {
            if let Some(lookup_id) = &field.lookup_id {
                fields_by_lookup
                    .entry(lookup_id.clone())
                    .or_default()
                    .push(field.name.clone());
            }
        }

        let lookup_ids: Vec<String> = fields_by_lookup.keys().cloned().collect();
        let results = join_all(lookup_ids.iter().map(|id| directory.lookup_options(id))).await;

        let mut loaded = 0;
        for (lookup_id, result) in lookup_ids.iter().zip(results) {
            match result {
                Ok(options) => {
                    debug!(lookup_id = %lookup_id, options = options.len(), "Loaded lookup options");
                    for field in &fields_by_lookup[lookup_id] {
                        self.lookups.set_fetched(field.clone(), options.clone());
                    }
                    loaded += 1;
                }
                Err(err) => {
                    warn!(lookup_id = %lookup_id, error = %err, "Failed to load lookup options");
                    self.notify(
                        NotificationLevel::Warning,
                        format!("Options for {} could not be loaded", lookup_id),
                    );
                }
            }
        }
        loaded
    }

    // --- Quick-create ---

    /// Open the quick-create sub-form for a lookup field.
    pub fn open_quick_create(&mut self, field_name: &str) -> Result<&QuickCreateSession> {
        if self.quick_create.as_ref().map(|s| s.is_submitting()).unwrap_or(false) {
            return Err(FormError::InFlight("Quick-create"));
        }
        let field = self
            .field(field_name)
            .ok_or_else(|| FormError::UnknownField(field_name.to_string()))?;

        match QuickCreateSession::open(&field, self.config.slug.max_len) {
            Ok(session) => {
                debug!(field = %field_name, handler = %session.action.handler, "Opened quick-create");
                Ok(self.quick_create.insert(session))
            }
            Err(err) => {
                self.notify(NotificationLevel::Warning, err.user_message());
                Err(err)
            }
        }
    }

    pub fn quick_create(&self) -> Option<&QuickCreateSession> {
        self.quick_create.as_ref()
    }

    pub fn set_quick_create_name(&mut self, name: &str) -> Result<()> {
        self.session_mut()?.set_name(name);
        Ok(())
    }

    pub fn set_quick_create_code(&mut self, code: &str) -> Result<()> {
        self.session_mut()?.set_code(code);
        Ok(())
    }

    /// Close the sub-form without creating anything.
    pub fn cancel_quick_create(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        if session.is_submitting() {
            return Err(FormError::InFlight("Quick-create"));
        }
        self.quick_create = None;
        Ok(())
    }

    /// Validate the sub-form and mark it submitting.
    pub fn begin_quick_create_submit(&mut self) -> Result<QuickCreateSubmission> {
        let result = self.session_mut()?.begin_submit();
        match result {
            Err(err @ FormError::MissingLookup(_)) => {
                self.notify(NotificationLevel::Warning, err.user_message());
                Err(err)
            }
            other => other,
        }
    }

    /// Apply the outcome of a quick-create submission.
    ///
    /// On success the option is learned, written as the field's value and the
    /// sub-form closes. On failure the sub-form stays open with the error.
    pub fn finish_quick_create_submit(
        &mut self,
        submission: &QuickCreateSubmission,
        result: std::result::Result<ActionResponse, ActionError>,
    ) -> Result<FormFieldOption> {
        let option = self.session_mut()?.finish_submit(submission, result)?;

        self.lookups.learn(submission.field_name.clone(), option.clone());
        let value = self.created_value(&submission.field_name, &option.value);
        self.apply(vec![FieldWrite::new(
            submission.field_name.clone(),
            value,
            WriteOrigin::Programmatic,
        )]);
        self.quick_create = None;

        info!(
            field = %submission.field_name,
            lookup_id = %submission.lookup_id,
            value = %option.value,
            "Quick-created lookup option"
        );
        Ok(option)
    }

    /// Submit the open sub-form through the executor.
    pub async fn submit_quick_create(&mut self) -> Result<FormFieldOption> {
        let executor = self.executor()?;
        let submission = self.begin_quick_create_submit()?;
        let request = ActionRequest::new(
            submission.input.clone(),
            ActionContext::new(self.schema.id.clone()),
        );
        let result = executor.execute(&submission.action, request).await;
        self.finish_quick_create_submit(&submission, result)
    }

    fn session_mut(&mut self) -> Result<&mut QuickCreateSession> {
        self.quick_create.as_mut().ok_or(FormError::NoQuickCreate)
    }

    fn created_value(&self, field_name: &str, value: &str) -> Value {
        let multi = self
            .schema
            .field(field_name)
            .map(|f| f.field_type == FieldType::MultiSelect)
            .unwrap_or(false);
        if !multi {
            return Value::String(value.to_string());
        }

        let mut items = match self.store.get(field_name) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let created = Value::String(value.to_string());
        if !items.contains(&created) {
            items.push(created);
        }
        Value::Array(items)
    }

    // --- Households ---

    pub fn household_options(&self) -> &[HouseholdOption] {
        self.household.options()
    }

    pub fn selected_household(&self) -> Option<&HouseholdOption> {
        self.household.selected()
    }

    pub fn directory_status(&self) -> DirectoryStatus {
        self.household.status()
    }

    /// Whether household fields render as free text: the directory failed
    /// or none is configured.
    pub fn is_household_manual_entry(&self) -> bool {
        self.directory.is_none() || self.household.is_manual_entry()
    }

    /// Select a household and propagate it into the form.
    pub fn select_household(&mut self, key: &str) -> Result<Vec<ValueChange>> {
        let writes = self.household.select(key, &self.store)?;
        Ok(self.apply(writes))
    }

    /// Issue a household listing request; earlier requests become stale.
    pub fn begin_household_fetch(&mut self, query: DirectoryQuery) -> DirectoryRequest {
        self.household.begin_fetch(query)
    }

    /// Apply a household listing if `request` is still the latest.
    pub fn complete_household_fetch(
        &mut self,
        request: &DirectoryRequest,
        result: std::result::Result<Vec<HouseholdRow>, ActionError>,
    ) -> FetchOutcome {
        let outcome = self.household.complete_fetch(request, result);
        if matches!(outcome, FetchOutcome::Degraded { first: true }) {
            self.notify(
                NotificationLevel::Warning,
                "Household directory is unavailable; enter household details manually",
            );
        }
        outcome
    }

    /// Fetch and apply a household listing from the directory.
    ///
    /// Without a directory nothing is fetched and no warning is raised.
    pub async fn load_households(&mut self, query: DirectoryQuery) -> FetchOutcome {
        let Some(directory) = self.directory.clone() else {
            return FetchOutcome::Degraded { first: false };
        };
        let request = self.begin_household_fetch(query);
        let result = directory.list_households(&request.query).await;
        self.complete_household_fetch(&request, result)
    }

    // --- Families ---

    pub fn families(&self) -> &[FamilyOption] {
        self.family.families()
    }

    /// Fetch the family directory and fill the primary family's address.
    pub async fn load_families(&mut self, query: DirectoryQuery) -> Vec<ValueChange> {
        let Some(directory) = self.directory.clone() else {
            return Vec::new();
        };
        let result = directory.list_families(&query).await;
        if self.family.apply_listing(result) {
            self.notify(NotificationLevel::Warning, "Family directory is unavailable");
        }
        let writes = self.family.primary_address_writes(&self.store);
        self.apply(writes)
    }

    /// Create a family inline and add it to the family options.
    pub async fn quick_create_family(&mut self, name: &str) -> Result<FamilyOption> {
        let name = FamilyReconciler::validate_new_family_name(name)?;
        let executor = self.executor()?;
        let in_flight = InFlightGuard::acquire(&self.creating_family)
            .ok_or(FormError::InFlight("Family creation"))?;

        let action = ActionDescriptor::new(self.config.quick_create.family_handler.clone());
        let request = ActionRequest::new(json!({ "name": name }), ActionContext::new(self.schema.id.clone()));
        let result = executor.execute_checked(&action, request).await;
        drop(in_flight);

        match result.and_then(|response| created_family(&response)) {
            Ok(family) => {
                info!(family_id = %family.id, "Quick-created family");
                self.family.upsert(family.clone());
                let writes = self.family.primary_address_writes(&self.store);
                self.apply(writes);
                Ok(family)
            }
            Err(err) => {
                warn!(error = %err, "Family quick-create failed");
                self.notify(NotificationLevel::Error, err.to_string());
                Err(FormError::Action(err))
            }
        }
    }

    /// Whether a family quick-create is waiting on the executor.
    pub fn is_creating_family(&self) -> bool {
        self.creating_family.load(Ordering::SeqCst)
    }

    fn executor(&self) -> Result<Arc<dyn ActionExecutor>> {
        self.executor.clone().ok_or_else(|| {
            FormError::Action(ActionError::Unavailable(
                "No action executor configured".to_string(),
            ))
        })
    }
}

/// Holds an in-flight flag and clears it when dropped, including when the
/// owning future is dropped mid-await.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::HouseholdAddress;
    use form_actions::{MockExecutor, StaticDirectory};
    use form_schema::{QuickCreateConfig, SectionSchema, TabSchema, VisibilityCondition};
    use std::sync::Mutex;

    fn fund_schema() -> FormSchema {
        FormSchema::from_fields(
            "fund-form",
            vec![
                FieldSchema::text("name").with_label("Name").required(),
                FieldSchema::text("code").derive_slug_from("name").required(),
                FieldSchema::new("restricted", FieldType::Checkbox),
                FieldSchema::text("restriction")
                    .required()
                    .visible_when(VisibilityCondition::truthy("restricted")),
                FieldSchema::select("ministry")
                    .with_lookup("ministries")
                    .with_options(vec![FormFieldOption::new("worship", "Worship")])
                    .with_quick_create(QuickCreateConfig::default()),
            ],
        )
        .with_submit_action(ActionDescriptor::new("funds.save"))
    }

    #[test]
    fn test_mount_rejects_invalid_schema() {
        let schema = FormSchema::from_fields(
            "bad",
            vec![FieldSchema::text("code").derive_slug_from("code")],
        );
        assert!(matches!(
            FormController::new(schema, json!({})),
            Err(FormError::Schema(_))
        ));
    }

    #[test]
    fn test_user_edit_stops_derivation() {
        let mut form = FormController::new(fund_schema(), json!({})).unwrap();
        form.set_value("name", json!("New Fund")).unwrap();
        assert_eq!(form.value("code"), Some(&json!("new-fund")));

        form.set_value("code", json!("custom")).unwrap();
        form.set_value("name", json!("Renamed Fund")).unwrap();
        assert_eq!(form.value("code"), Some(&json!("custom")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut form = FormController::new(fund_schema(), json!({})).unwrap();
        assert!(matches!(
            form.set_value("nope", json!(1)),
            Err(FormError::UnknownField(_))
        ));
    }

    #[test]
    fn test_validation_skips_invisible_fields() {
        let mut form = FormController::new(fund_schema(), json!({})).unwrap();
        let fields: Vec<String> = form.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "code"]);

        form.set_value("restricted", json!(true)).unwrap();
        let fields: Vec<String> = form.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "code", "restriction"]);
        assert!(form.validate_field("restriction").is_err());
    }

    #[test]
    fn test_augmented_fields_carry_default_action() {
        let form = FormController::new(fund_schema(), json!({})).unwrap();
        let ministry = form.field("ministry").unwrap();
        let action = ministry.quick_create.unwrap().action.unwrap();
        assert_eq!(action.handler, "lookups.quickCreate");
        assert_eq!(action.config, json!({ "lookupId": "ministries" }));
    }

    #[test]
    fn test_quick_create_without_lookup_notifies() {
        let schema = FormSchema::from_fields(
            "f",
            vec![FieldSchema::select("fund").with_quick_create(QuickCreateConfig::default())],
        );
        let mut form = FormController::new(schema, json!({})).unwrap();
        assert!(matches!(
            form.open_quick_create("fund"),
            Err(FormError::MissingLookup(_))
        ));
        assert_eq!(form.notifications().len(), 1);
        assert!(form.quick_create().is_none());
    }

    #[test]
    fn test_tabs() {
        let schema = FormSchema {
            id: "person".to_string(),
            title: "Person".to_string(),
            tabs: vec![
                TabSchema::new(
                    "profile",
                    vec![SectionSchema::new("basics", vec![FieldSchema::text("firstName")])],
                ),
                TabSchema::new(
                    "giving",
                    vec![SectionSchema::new("envelope", vec![FieldSchema::text("envelopeNumber")])],
                ),
            ],
            sections: Vec::new(),
            submit_action: None,
            submit_label: None,
        };
        let mut form = FormController::new(schema, json!({})).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        form.on_tab_change(move |tab| log.lock().unwrap().push(tab.to_string()));

        assert_eq!(form.active_tab(), "profile");
        form.set_active_tab("giving").unwrap();
        form.set_active_tab("giving").unwrap();
        assert!(matches!(form.set_active_tab("billing"), Err(FormError::UnknownTab(_))));
        assert_eq!(*seen.lock().unwrap(), vec!["giving"]);
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut form = FormController::new(fund_schema(), json!({ "name": "General" })).unwrap();
        form.set_value("name", json!("Missions")).unwrap();
        form.set_value("code", json!("m")).unwrap();
        assert!(form.is_dirty());

        form.reset();
        assert_eq!(form.value("name"), Some(&json!("General")));
        assert!(form.value("code").is_none());
        assert!(!form.is_manually_edited("code"));
        assert!(!form.is_dirty());

        form.set_value("name", json!("Benevolence")).unwrap();
        assert_eq!(form.value("code"), Some(&json!("benevolence")));
    }

    #[tokio::test]
    async fn test_submit_requires_valid_form() {
        let executor = Arc::new(MockExecutor::new("mock"));
        let mut form = FormController::new(fund_schema(), json!({}))
            .unwrap()
            .with_executor(executor.clone());

        assert!(matches!(form.submit().await, Err(FormError::Validation(_))));
        assert_eq!(form.field_errors().len(), 2);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_sends_snapshot_with_record_context() {
        let executor = Arc::new(
            MockExecutor::new("mock").with_response("funds.save", ActionResponse::ok(json!({ "id": "f-1" }))),
        );
        let mut form = FormController::new(fund_schema(), json!({ "id": "f-1", "name": "General" }))
            .unwrap()
            .with_executor(executor.clone());
        let completed = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&completed);
        form.on_submit_success(move |_| *counter.lock().unwrap() += 1);

        form.set_value("code", json!("gen")).unwrap();
        form.submit().await.unwrap();

        let call = executor.last_call().await.unwrap();
        assert_eq!(call.action.handler, "funds.save");
        assert_eq!(call.request.input["code"], "gen");
        assert_eq!(call.request.context.record_id.as_deref(), Some("f-1"));
        assert_eq!(*completed.lock().unwrap(), 1);
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn test_failed_submit_preserves_values() {
        let executor = Arc::new(
            MockExecutor::new("mock").with_response("funds.save", ActionResponse::failure("Code already in use")),
        );
        let mut form = FormController::new(fund_schema(), json!({}))
            .unwrap()
            .with_executor(executor);
        form.set_value("name", json!("General")).unwrap();

        assert!(form.submit().await.is_err());
        assert_eq!(form.submit_error(), Some("Code already in use"));
        assert_eq!(form.value("code"), Some(&json!("general")));
        assert_eq!(form.notifications()[0].level, NotificationLevel::Error);
    }

    #[test]
    fn test_duplicate_submit_is_rejected() {
        let mut form = FormController::new(fund_schema(), json!({ "name": "General", "code": "general" })).unwrap();
        let ticket = form.begin_submit().unwrap();
        assert!(matches!(form.begin_submit(), Err(FormError::InFlight(_))));

        form.finish_submit(&ticket, Ok(ActionResponse::ok(json!({})))).unwrap();
        assert!(form.begin_submit().is_ok());
    }

    #[tokio::test]
    async fn test_lookup_failure_warns_per_lookup() {
        let directory = Arc::new(StaticDirectory::new().with_available(false));
        let mut form = FormController::new(fund_schema(), json!({}))
            .unwrap()
            .with_directory(directory);

        assert_eq!(form.load_lookup_options().await, 0);
        assert_eq!(form.take_notifications().len(), 1);
        assert_eq!(form.options("ministry"), vec![FormFieldOption::new("worship", "Worship")]);
    }

    #[tokio::test]
    async fn test_lookup_options_merge_fetched() {
        let directory = Arc::new(StaticDirectory::new().with_lookup(
            "ministries",
            vec![
                FormFieldOption::new("worship", "Worship Team"),
                FormFieldOption::new("youth", "Youth"),
            ],
        ));
        let mut form = FormController::new(fund_schema(), json!({}))
            .unwrap()
            .with_directory(directory);

        assert_eq!(form.load_lookup_options().await, 1);
        let values: Vec<String> = form.options("ministry").into_iter().map(|o| o.value).collect();
        assert_eq!(values, vec!["worship", "youth"]);
    }

    // =========================================================================
    // Reconcilers on forms without their fields
    // =========================================================================

    #[tokio::test]
    async fn test_name_only_form_submits_without_roster() {
        let schema = FormSchema::from_fields(
            "visitor-card",
            vec![FieldSchema::text("firstName"), FieldSchema::text("lastName")],
        )
        .with_submit_action(ActionDescriptor::new("visitors.save"));
        let executor = Arc::new(MockExecutor::new("mock"));
        let mut form = FormController::new(schema, json!({}))
            .unwrap()
            .with_executor(executor.clone());
        assert!(!form.household.is_enabled());

        form.set_value("firstName", json!("Jane")).unwrap();
        form.submit().await.unwrap();

        let call = executor.last_call().await.unwrap();
        assert_eq!(call.request.input, json!({ "firstName": "Jane" }));
        assert!(form.value("householdMembers").is_none());
    }

    #[test]
    fn test_primary_family_skips_undeclared_address_fields() {
        let schema = FormSchema::from_fields(
            "membership-card",
            vec![
                FieldSchema::text("firstName"),
                FieldSchema::new("familyMemberships", FieldType::FamilyMemberships),
            ],
        );
        let mut form = FormController::new(schema, json!({})).unwrap();
        assert!(form.family.is_enabled());
        form.family.upsert(FamilyOption {
            id: "f-1".to_string(),
            name: "Doe Family".to_string(),
            address: HouseholdAddress {
                street: Some("1 Church St".to_string()),
                city: Some("Salem".to_string()),
                state: Some("OR".to_string()),
                postal_code: Some("97301".to_string()),
            },
        });

        form.set_value(
            "familyMemberships",
            json!([{ "familyId": "f-1", "isPrimary": true }]),
        )
        .unwrap();

        assert!(form.value("addressStreet").is_none());
        assert!(form.value("addressPostalCode").is_none());
        assert_eq!(form.values().as_object().map(|m| m.len()), Some(1));
    }

    #[test]
    fn test_family_reconciler_off_without_memberships_field() {
        let form = FormController::new(fund_schema(), json!({})).unwrap();
        assert!(!form.family.is_enabled());
        assert!(!form.household.is_enabled());
    }

    // =========================================================================
    // Family quick-create
    // =========================================================================

    /// Executor whose calls never complete.
    struct StalledExecutor;

    #[async_trait::async_trait]
    impl ActionExecutor for StalledExecutor {
        fn id(&self) -> &str {
            "stalled"
        }

        async fn execute(
            &self,
            _action: &ActionDescriptor,
            _request: ActionRequest,
        ) -> std::result::Result<ActionResponse, ActionError> {
            futures::future::pending().await
        }
    }

    #[test]
    fn test_dropped_family_create_releases_flag() {
        use futures::FutureExt;

        let mut form = FormController::new(fund_schema(), json!({}))
            .unwrap()
            .with_executor(Arc::new(StalledExecutor));

        assert!(form.quick_create_family("Lee Family").now_or_never().is_none());
        assert!(!form.is_creating_family());

        // A second attempt reaches the executor again instead of failing fast.
        assert!(form.quick_create_family("Lee Family").now_or_never().is_none());
        assert!(!form.is_creating_family());
    }

    #[test]
    fn test_in_flight_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let held = InFlightGuard::acquire(&flag).unwrap();
        assert!(InFlightGuard::acquire(&flag).is_none());

        drop(held);
        assert!(InFlightGuard::acquire(&flag).is_some());
    }
}
