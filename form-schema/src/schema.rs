//! Form-level schema: tabs, sections and the fields inside them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{ActionDescriptor, FieldSchema};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Id given to the implicit tab of a schema declared without tabs.
pub const DEFAULT_TAB_ID: &str = "main";

/// Error types for schema validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two fields share a name
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// A field derives its slug from itself
    #[error("Field {0} cannot derive its value from itself")]
    SelfDerivation(String),

    /// A field derives its slug from a field that does not exist
    #[error("Field {field} derives from unknown field {source_field}")]
    UnknownDerivationSource { field: String, source_field: String },

    /// Two tabs share an id
    #[error("Duplicate tab id: {0}")]
    DuplicateTab(String),

    /// Two sections share an id
    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),
}

/// A titled group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SectionSchema {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl SectionSchema {
    pub fn new(id: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: None,
            fields,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// A tab of sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TabSchema {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sections: Vec<SectionSchema>,
}

impl TabSchema {
    pub fn new(id: impl Into<String>, sections: Vec<SectionSchema>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            sections,
        }
    }
}

/// Complete declarative description of one form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tabs: Vec<TabSchema>,
    /// Sections of a schema declared without tabs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_action: Option<ActionDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
}

impl FormSchema {
    /// Create a single-section schema from a flat field list.
    pub fn from_fields(id: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            tabs: Vec::new(),
            sections: vec![SectionSchema::new("default", fields)],
            submit_action: None,
            submit_label: None,
        }
    }

    pub fn with_submit_action(mut self, action: ActionDescriptor) -> Self {
        self.submit_action = Some(action);
        self
    }

    /// Fold top-level sections into the implicit `main` tab.
    pub fn normalized(mut self) -> Self {
        if !self.sections.is_empty() {
            let sections = std::mem::take(&mut self.sections);
            match self.tabs.iter_mut().find(|t| t.id == DEFAULT_TAB_ID) {
                Some(tab) => tab.sections.extend(sections),
                None => self.tabs.insert(0, TabSchema::new(DEFAULT_TAB_ID, sections)),
            }
        }
        self
    }

    /// All tab ids in declaration order.
    pub fn tab_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        if !self.sections.is_empty() && !self.tabs.iter().any(|t| t.id == DEFAULT_TAB_ID) {
            ids.push(DEFAULT_TAB_ID);
        }
        ids.extend(self.tabs.iter().map(|t| t.id.as_str()));
        ids
    }

    /// Iterate every field in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.sections
            .iter()
            .chain(self.tabs.iter().flat_map(|t| t.sections.iter()))
            .flat_map(|s| s.fields.iter())
    }

    /// Iterate the fields of one tab.
    pub fn fields_in_tab<'a>(&'a self, tab_id: &'a str) -> impl Iterator<Item = &'a FieldSchema> {
        let loose = if tab_id == DEFAULT_TAB_ID {
            self.sections.as_slice()
        } else {
            &[]
        };
        loose
            .iter()
            .chain(
                self.tabs
                    .iter()
                    .filter(move |t| t.id == tab_id)
                    .flat_map(|t| t.sections.iter()),
            )
            .flat_map(|s| s.fields.iter())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields().find(|f| f.name == name)
    }

    /// Check the structural invariants of the schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut tab_ids = HashSet::new();
        for tab in &self.tabs {
            if !tab_ids.insert(tab.id.as_str()) {
                return Err(SchemaError::DuplicateTab(tab.id.clone()));
            }
        }

        let mut section_ids = HashSet::new();
        for section in self
            .sections
            .iter()
            .chain(self.tabs.iter().flat_map(|t| t.sections.iter()))
        {
            if !section_ids.insert(section.id.as_str()) {
                return Err(SchemaError::DuplicateSection(section.id.clone()));
            }
        }

        let mut names = HashSet::new();
        for field in self.fields() {
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        for field in self.fields() {
            if let Some(source) = &field.derive_slug_from {
                if source == &field.name {
                    return Err(SchemaError::SelfDerivation(field.name.clone()));
                }
                if !names.contains(source.as_str()) {
                    return Err(SchemaError::UnknownDerivationSource {
                        field: field.name.clone(),
                        source_field: source.clone(),
                    });
                }
            }

            if let Some(condition) = &field.visible_when {
                if !names.contains(condition.field.as_str()) {
                    tracing::warn!(
                        form_id = %self.id,
                        field = %field.name,
                        watched = %condition.field,
                        "Visibility condition watches a field that is not in the form"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    fn fund_schema() -> FormSchema {
        FormSchema::from_fields(
            "fund",
            vec![
                FieldSchema::text("name").required(),
                FieldSchema::text("code").derive_slug_from("name"),
            ],
        )
    }

    #[test]
    fn test_valid_schema() {
        assert!(fund_schema().validate().is_ok());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut schema = fund_schema();
        schema.sections[0].fields.push(FieldSchema::text("name"));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateField("name".to_string()))
        );
    }

    #[test]
    fn test_self_derivation_rejected() {
        let schema = FormSchema::from_fields(
            "loop",
            vec![FieldSchema::text("code").derive_slug_from("code")],
        );
        assert_eq!(
            schema.validate(),
            Err(SchemaError::SelfDerivation("code".to_string()))
        );
    }

    #[test]
    fn test_unknown_derivation_source_rejected() {
        let schema = FormSchema::from_fields(
            "orphan",
            vec![FieldSchema::text("code").derive_slug_from("title")],
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::UnknownDerivationSource { .. })
        ));
    }

    #[test]
    fn test_fields_span_tabs_in_order() {
        let schema = FormSchema {
            id: "person".to_string(),
            title: "Person".to_string(),
            tabs: vec![
                TabSchema::new(
                    "profile",
                    vec![SectionSchema::new(
                        "names",
                        vec![FieldSchema::text("firstName"), FieldSchema::text("lastName")],
                    )],
                ),
                TabSchema::new(
                    "household",
                    vec![SectionSchema::new(
                        "home",
                        vec![FieldSchema::new("householdId", FieldType::Household)],
                    )],
                ),
            ],
            sections: Vec::new(),
            submit_action: None,
            submit_label: None,
        };

        let names: Vec<&str> = schema.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["firstName", "lastName", "householdId"]);

        let household: Vec<&str> = schema
            .fields_in_tab("household")
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(household, vec!["householdId"]);
        assert_eq!(schema.tab_ids(), vec!["profile", "household"]);
    }

    #[test]
    fn test_flat_sections_become_main_tab() {
        let schema = fund_schema();
        assert_eq!(schema.tab_ids(), vec![DEFAULT_TAB_ID]);
        assert_eq!(schema.fields_in_tab(DEFAULT_TAB_ID).count(), 2);

        let normalized = schema.normalized();
        assert!(normalized.sections.is_empty());
        assert_eq!(normalized.tabs[0].id, DEFAULT_TAB_ID);
        assert_eq!(normalized.fields().count(), 2);
    }

    #[test]
    fn test_schema_from_yaml() {
        let yaml = r#"
id: giving-fund
title: Giving Fund
submitAction:
  handler: funds.create
sections:
  - id: basics
    title: Basics
    fields:
      - name: name
        type: text
        required: true
        colSpan: half
      - name: code
        type: text
        colSpan: half
        deriveSlugFrom: name
"#;
        let schema: FormSchema = serde_yaml::from_str(yaml).unwrap();
        assert!(schema.validate().is_ok());
        assert_eq!(
            schema.submit_action.as_ref().map(|a| a.handler.as_str()),
            Some("funds.create")
        );
        assert_eq!(schema.field("code").unwrap().derive_slug_from.as_deref(), Some("name"));
    }
}
