//! Form Engine - reactive runtime for metadata-driven forms
//!
//! Turns a [`FormSchema`](form_schema::FormSchema) into a live form: a value
//! store with subscriptions, slug derivation, conditional visibility, inline
//! quick-create of lookup options, and household/family reconciliation that
//! fills directory data into the form without overwriting user input.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      FormController                       │
//! │  validate / submit / reset / tabs / notifications         │
//! └──────┬──────────────────────┬───────────────────┬─────────┘
//!        │ writes               │ quick-create      │ directory
//!        ▼                      ▼                   ▼
//! ┌──────────────┐      ┌───────────────┐   ┌────────────────┐
//! │FormValueStore│      │QuickCreate    │   │LookupOption    │
//! │ subscriptions│      │Session        │──▶│Registry        │
//! └──────┬───────┘      └───────────────┘   └────────────────┘
//!        │ committed changes
//!        ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │ Reactors: Derivation │ Visibility │ Household │ Family    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Reactors answer committed changes with further writes, which are
//! committed in order until the cascade settles.
//!
//! # Example
//!
//! ```
//! use form_engine::FormController;
//! use form_schema::{FieldSchema, FormSchema};
//! use serde_json::json;
//!
//! let schema = FormSchema::from_fields(
//!     "fund",
//!     vec![
//!         FieldSchema::text("name").required(),
//!         FieldSchema::text("code").derive_slug_from("name"),
//!     ],
//! );
//! let mut form = FormController::new(schema, json!({})).unwrap();
//! form.set_value("name", json!("New Fund")).unwrap();
//! assert_eq!(form.value("code"), Some(&json!("new-fund")));
//! ```

pub mod config;
pub mod controller;
pub mod derivation;
pub mod family;
pub mod household;
pub mod lookup;
pub mod quick_create;
pub mod reactor;
pub mod store;
pub mod types;
pub mod validation;
pub mod visibility;

pub use config::{EngineConfig, FamilyBindings, GeneralConfig, HouseholdBindings, QuickCreateSettings, SlugConfig};
pub use controller::{FormController, SubmitTicket};
pub use derivation::DerivationEngine;
pub use family::{FamilyMembership, FamilyOption, FamilyReconciler};
pub use household::{
    build_household_key, merge_household_options, DirectoryRequest, DirectoryStatus, FetchOutcome,
    HouseholdAddress, HouseholdOption, HouseholdReconciler,
};
pub use lookup::{augment_field, LookupOptionRegistry};
pub use quick_create::{QuickCreateSession, QuickCreateSubmission};
pub use reactor::FieldReactor;
pub use store::{FormValueStore, SubscriptionId, Topic};
pub use types::*;
pub use visibility::VisibilityWatcher;
