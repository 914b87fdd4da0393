//! Row layout for form fields.
//!
//! A row holds at most [`ROW_CAPACITY`] column units. Fields are placed
//! greedily in declaration order; a field that would overflow the current row
//! closes it and starts a new one.

use std::collections::HashMap;

use crate::types::FieldSchema;

/// Column units available in one row.
pub const ROW_CAPACITY: u8 = 2;

/// One visual row of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow<'a> {
    pub fields: Vec<&'a FieldSchema>,
}

impl<'a> FieldRow<'a> {
    /// Column units consumed by the row.
    pub fn units(&self) -> u8 {
        self.fields.iter().map(|f| f.col_span.units()).sum()
    }

    /// Whether any field in the row shows helper text.
    pub fn has_helper_text(&self) -> bool {
        self.fields.iter().any(|f| f.has_helper_text())
    }

    pub fn names(&self) -> Vec<&'a str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Partition fields into rows of at most two column units.
pub fn group_fields_into_rows<'a, I>(fields: I) -> Vec<FieldRow<'a>>
where
    I: IntoIterator<Item = &'a FieldSchema>,
{
    let mut rows = Vec::new();
    let mut current: Vec<&'a FieldSchema> = Vec::new();
    let mut used: u8 = 0;

    for field in fields {
        let units = field.col_span.units();
        if used + units > ROW_CAPACITY && !current.is_empty() {
            rows.push(FieldRow {
                fields: std::mem::take(&mut current),
            });
            used = 0;
        }
        current.push(field);
        used += units;
    }

    if !current.is_empty() {
        rows.push(FieldRow { fields: current });
    }

    rows
}

/// Map each field name to whether its row reserves helper-text space.
pub fn build_field_row_helper_map<'a>(rows: &[FieldRow<'a>]) -> HashMap<&'a str, bool> {
    let mut map = HashMap::new();
    for row in rows {
        let reserve = row.has_helper_text();
        for field in &row.fields {
            map.insert(field.name.as_str(), reserve);
        }
    }
    map
}
