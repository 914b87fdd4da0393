//! Family memberships.
//!
//! A person may belong to several families; the membership flagged primary
//! supplies address auto-fill. As with households, only address subfields
//! that are still empty are written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use form_actions::{ActionError, ActionResponse, FamilyRow};

use crate::config::{FamilyBindings, HouseholdBindings};
use crate::household::HouseholdAddress;
use crate::reactor::FieldReactor;
use crate::store::FormValueStore;
use crate::types::{FieldWrite, FormError, Result, ValueChange, WriteOrigin};

/// A family from the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: HouseholdAddress,
}

impl From<FamilyRow> for FamilyOption {
    fn from(row: FamilyRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            address: HouseholdAddress {
                street: row.address_street,
                city: row.address_city,
                state: row.address_state,
                postal_code: row.address_postal_code,
            },
        }
    }
}

/// One entry of the `familyMemberships` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMembership {
    pub family_id: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Fields the engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse the memberships stored in a field, skipping malformed entries.
pub fn parse_memberships(value: Option<&Value>) -> Vec<FamilyMembership> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(membership) => Some(membership),
            Err(err) => {
                debug!(error = %err, "Skipping malformed family membership");
                None
            }
        })
        .collect()
}

/// The first membership flagged primary.
pub fn primary_membership(memberships: &[FamilyMembership]) -> Option<&FamilyMembership> {
    memberships.iter().find(|m| m.is_primary)
}

/// Extract the family created by a quick-create response.
pub fn created_family(response: &ActionResponse) -> std::result::Result<FamilyOption, ActionError> {
    let family = response
        .data
        .as_ref()
        .and_then(|data| data.get("family"))
        .cloned()
        .ok_or_else(|| ActionError::ParseError("Response has no family".to_string()))?;
    let row: FamilyRow =
        serde_json::from_value(family).map_err(|e| ActionError::ParseError(e.to_string()))?;
    Ok(row.into())
}

/// Copies the primary family's address into empty address fields.
#[derive(Debug, Clone)]
pub struct FamilyReconciler {
    bindings: FamilyBindings,
    address_bindings: HouseholdBindings,
    families: Vec<FamilyOption>,
    degraded_once: bool,
    enabled: bool,
}

impl FamilyReconciler {
    pub fn new(bindings: FamilyBindings, address_bindings: HouseholdBindings) -> Self {
        Self {
            bindings,
            address_bindings,
            families: Vec::new(),
            degraded_once: false,
            enabled: true,
        }
    }

    /// Turn address fill off for forms without a memberships field.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn families(&self) -> &[FamilyOption] {
        &self.families
    }

    pub fn family(&self, id: &str) -> Option<&FamilyOption> {
        self.families.iter().find(|f| f.id == id)
    }

    /// Add or replace a family, keeping the list sorted by name.
    pub fn upsert(&mut self, family: FamilyOption) {
        match self.families.iter_mut().find(|f| f.id == family.id) {
            Some(existing) => *existing = family,
            None => self.families.push(family),
        }
        self.families.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// Apply a directory listing. Returns true the first time a listing fails.
    pub fn apply_listing(&mut self, result: std::result::Result<Vec<FamilyRow>, ActionError>) -> bool {
        match result {
            Ok(rows) => {
                for row in rows {
                    self.upsert(row.into());
                }
                false
            }
            Err(err) => {
                let first = !self.degraded_once;
                self.degraded_once = true;
                if first {
                    warn!(error = %err, "Family directory unavailable");
                }
                first
            }
        }
    }

    /// Address writes for the current primary membership.
    pub fn primary_address_writes(&self, store: &FormValueStore) -> Vec<FieldWrite> {
        if !self.enabled {
            return Vec::new();
        }
        let memberships = parse_memberships(store.get(&self.bindings.memberships_field));
        let Some(primary) = primary_membership(&memberships) else {
            return Vec::new();
        };
        let Some(family) = self.family(&primary.family_id) else {
            debug!(family_id = %primary.family_id, "Primary family not loaded");
            return Vec::new();
        };
        family
            .address
            .fill_empty(store, &self.address_bindings, WriteOrigin::Reconciled)
    }

    /// Check a family quick-create name.
    pub fn validate_new_family_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FormError::InvalidInput("Family name is required".to_string()));
        }
        Ok(name.to_string())
    }
}

impl FieldReactor for FamilyReconciler {
    fn name(&self) -> &'static str {
        "family"
    }

    fn watches(&self, field: &str) -> bool {
        self.enabled && field == self.bindings.memberships_field
    }

    fn react(&mut self, _change: &ValueChange, store: &FormValueStore) -> Vec<FieldWrite> {
        self.primary_address_writes(store)
    }
}
