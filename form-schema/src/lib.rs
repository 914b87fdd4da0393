//! Field Schema for metadata-driven forms
//!
//! Passive descriptions of fields, sections and tabs as delivered by the
//! metadata service, plus the pure functions evaluated over them at render
//! time:
//!
//! - [`group_fields_into_rows`]: partitions fields into two-unit rows
//! - [`build_field_row_helper_map`]: reserves helper-text space per row
//! - [`is_visible`]: evaluates a [`VisibilityCondition`]
//! - [`slugify`]: derives codes from human names
//! - [`merge_options`]: merges learned lookup options into a field's base list
//!
//! # Example
//!
//! ```
//! use form_schema::{group_fields_into_rows, ColSpan, FieldSchema};
//!
//! let fields = vec![
//!     FieldSchema::text("firstName").with_span(ColSpan::Half),
//!     FieldSchema::text("lastName").with_span(ColSpan::Half),
//!     FieldSchema::text("notes"),
//! ];
//! let rows = group_fields_into_rows(&fields);
//! assert_eq!(rows.len(), 2);
//! ```

pub mod layout;
pub mod options;
pub mod schema;
pub mod slug;
pub mod types;
pub mod visibility;

pub use layout::{build_field_row_helper_map, group_fields_into_rows, FieldRow, ROW_CAPACITY};
pub use options::{merge_option_layers, merge_options};
pub use schema::{FormSchema, SchemaError, SectionSchema, TabSchema, DEFAULT_TAB_ID};
pub use slug::{slugify, slugify_with_limit, SLUG_MAX_LEN};
pub use types::*;
pub use visibility::{is_truthy, is_visible, strict_equals};
