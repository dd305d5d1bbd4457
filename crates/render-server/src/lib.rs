//! Render request handling for the render server.
//!
//! This crate provides:
//! - `RenderHandler` - Validates a request, renders it, writes the response
//! - `RenderEnvironment` - Pluggable collaborator that renders a URL
//! - `ErrorResponder` - Optional hook producing custom error responses
//! - `handle_error` - Best-effort error response that never fails
//! - `SimplifiedError` / `format_error` - Error normalization and rendering
//! - `RenderServerConfig` - File-based configuration

mod config;
mod environment;
mod error_handler;
mod extract;
mod format;
mod handler;
mod response;

pub use config::*;
pub use environment::*;
pub use error_handler::*;
pub use extract::*;
pub use format::*;
pub use handler::*;
pub use response::*;

// Re-export the data model for implementers of the collaborator traits
pub use render_core::{ErrorKind, Headers, RenderError, RenderRequest, RenderResult};
