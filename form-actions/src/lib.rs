//! Form Actions - external collaborators of the form engine
//!
//! Provides the two seams the engine talks to over the network:
//! - [`ActionExecutor`]: executes opaque action descriptors (submit,
//!   quick-create, family creation)
//! - [`DirectoryClient`]: read-only listings of households, families and
//!   lookup options
//!
//! Each seam has an HTTP implementation for the live service and an
//! in-memory one for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             FormController              │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌──────────────┐      ┌───────────────┐
//! │ActionExecutor│      │DirectoryClient│
//! │ (HTTP/Mock)  │      │(HTTP/Static)  │
//! └──────────────┘      └───────────────┘
//! ```

pub mod directory;
pub mod executor;

pub use directory::{
    DirectoryClient, DirectoryQuery, FamilyRow, HouseholdRow, HttpDirectoryClient, StaticDirectory,
};
pub use executor::{
    ActionContext, ActionError, ActionExecutor, ActionRequest, ActionResponse, HttpActionExecutor,
    MockExecutor, RecordedCall,
};
