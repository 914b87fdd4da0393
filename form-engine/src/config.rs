//! Configuration for the form engine.

use serde::{Deserialize, Serialize};

use form_schema::SLUG_MAX_LEN;

/// Configuration for a form controller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slug derivation
    pub slug: SlugConfig,
    /// Quick-create actions
    pub quick_create: QuickCreateSettings,
    /// Household field bindings
    pub household: HouseholdBindings,
    /// Family membership bindings
    pub family: FamilyBindings,
    /// General settings
    pub general: GeneralConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Slug configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlugConfig {
    /// Maximum slug length
    pub max_len: usize,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_len: SLUG_MAX_LEN,
        }
    }
}

/// Quick-create configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickCreateSettings {
    /// Handler synthesized for lookup fields whose quick-create has no action
    pub default_handler: String,
    /// Handler used to create families inline
    pub family_handler: String,
}

impl Default for QuickCreateSettings {
    fn default() -> Self {
        Self {
            default_handler: "lookups.quickCreate".to_string(),
            family_handler: "families.quickCreate".to_string(),
        }
    }
}

/// Names of the form fields the household reconciler reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdBindings {
    pub household_id: String,
    pub household_name: String,
    pub envelope_number: String,
    pub address_street: String,
    pub address_city: String,
    pub address_state: String,
    pub address_postal_code: String,
    pub members: String,
    pub first_name: String,
    pub last_name: String,
    /// Prefix of keys synthesized for households without a durable id
    pub synthetic_key_prefix: String,
}

impl Default for HouseholdBindings {
    fn default() -> Self {
        Self {
            household_id: "householdId".to_string(),
            household_name: "householdName".to_string(),
            envelope_number: "envelopeNumber".to_string(),
            address_street: "addressStreet".to_string(),
            address_city: "addressCity".to_string(),
            address_state: "addressState".to_string(),
            address_postal_code: "addressPostalCode".to_string(),
            members: "householdMembers".to_string(),
            first_name: "firstName".to_string(),
            last_name: "lastName".to_string(),
            synthetic_key_prefix: "name:".to_string(),
        }
    }
}

impl HouseholdBindings {
    /// Address subfields in street, city, state, postal code order.
    pub fn address_fields(&self) -> [&str; 4] {
        [
            &self.address_street,
            &self.address_city,
            &self.address_state,
            &self.address_postal_code,
        ]
    }
}

/// Family membership configuration. Address fields are shared with
/// [`HouseholdBindings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyBindings {
    pub memberships_field: String,
}

impl Default for FamilyBindings {
    fn default() -> Self {
        Self {
            memberships_field: "familyMemberships".to_string(),
        }
    }
}

/// General configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximum reactor writes processed for one user event
    pub max_cascade_depth: usize,
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: 64,
            log_level: "info".to_string(),
        }
    }
}
