//! Directory read APIs.
//!
//! Households, families and lookup option lists are fetched through the
//! [`DirectoryClient`] trait. Rows use the snake_case wire names of the
//! directory service.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use form_schema::FormFieldOption;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::executor::ActionError;

pub use http::HttpDirectoryClient;
pub use mock::StaticDirectory;

/// One row of `GET /households`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HouseholdRow {
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub envelope_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub member_names: Vec<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_street: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_city: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_state: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_postal_code: Option<String>,
}

/// One row of `GET /families`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FamilyRow {
    #[serde(deserialize_with = "required_text")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_street: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_city: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_state: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address_postal_code: Option<String>,
}

/// `{data: [...]}` envelope used by every directory endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Filter for a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
}

impl DirectoryQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            limit: None,
        }
    }

    /// Key identifying what this query asks for.
    pub fn key(&self) -> String {
        format!(
            "{}|{}",
            self.search.as_deref().unwrap_or(""),
            self.limit.map(|l| l.to_string()).unwrap_or_default()
        )
    }
}

/// Read-only directory collaborator.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// List households matching `query`.
    async fn list_households(&self, query: &DirectoryQuery) -> Result<Vec<HouseholdRow>, ActionError>;

    /// List families matching `query`.
    async fn list_families(&self, query: &DirectoryQuery) -> Result<Vec<FamilyRow>, ActionError>;

    /// Fetch the option list of an external lookup.
    async fn lookup_options(&self, lookup_id: &str) -> Result<Vec<FormFieldOption>, ActionError>;
}

/// Accept strings, numbers or null; blank strings become `None`.
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_text(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing identifier"))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
