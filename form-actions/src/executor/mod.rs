//! Action execution abstraction layer.
//!
//! Provides a trait-based interface over the backend action service:
//! - HTTP executor for the live service
//! - Mock executor for testing

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpActionExecutor;
pub use mock::{MockExecutor, RecordedCall};
pub use traits::{ActionContext, ActionError, ActionExecutor, ActionRequest, ActionResponse};
