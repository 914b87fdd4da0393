//! In-memory directory for tests and offline previews.

use async_trait::async_trait;
use form_schema::FormFieldOption;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::*;

/// Directory serving fixed rows.
pub struct StaticDirectory {
    households: Vec<HouseholdRow>,
    families: Vec<FamilyRow>,
    lookups: HashMap<String, Vec<FormFieldOption>>,
    available: AtomicBool,
    call_count: AtomicU32,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            households: Vec::new(),
            families: Vec::new(),
            lookups: HashMap::new(),
            available: AtomicBool::new(true),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_households(mut self, households: Vec<HouseholdRow>) -> Self {
        self.households = households;
        self
    }

    pub fn with_families(mut self, families: Vec<FamilyRow>) -> Self {
        self.families = families;
        self
    }

    pub fn with_lookup(mut self, lookup_id: impl Into<String>, options: Vec<FormFieldOption>) -> Self {
        self.lookups.insert(lookup_id.into(), options);
        self
    }

    /// Set availability. An unavailable directory fails every call.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ActionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ActionError::Unavailable("Static directory disabled".to_string()))
        }
    }
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_search(name: &str, query: &DirectoryQuery) -> bool {
    query
        .search
        .as_deref()
        .map(|term| name.to_lowercase().contains(&term.to_lowercase()))
        .unwrap_or(true)
}

fn apply_limit<T>(mut rows: Vec<T>, query: &DirectoryQuery) -> Vec<T> {
    if let Some(limit) = query.limit {
        rows.truncate(limit as usize);
    }
    rows
}

#[async_trait]
impl DirectoryClient for StaticDirectory {
    async fn list_households(&self, query: &DirectoryQuery) -> Result<Vec<HouseholdRow>, ActionError> {
        self.check()?;
        let rows = self
            .households
            .iter()
            .filter(|h| matches_search(&h.name, query))
            .cloned()
            .collect();
        Ok(apply_limit(rows, query))
    }

    async fn list_families(&self, query: &DirectoryQuery) -> Result<Vec<FamilyRow>, ActionError> {
        self.check()?;
        let rows = self
            .families
            .iter()
            .filter(|f| matches_search(&f.name, query))
            .cloned()
            .collect();
        Ok(apply_limit(rows, query))
    }

    async fn lookup_options(&self, lookup_id: &str) -> Result<Vec<FormFieldOption>, ActionError> {
        self.check()?;
        Ok(self.lookups.get(lookup_id).cloned().unwrap_or_default())
    }
}
