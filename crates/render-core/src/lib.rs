//! Core abstractions for the render server.
//!
//! This crate provides the fundamental types:
//! - `RenderRequest` - Immutable view of an inbound render request
//! - `RenderResult` - What a render environment hands back
//! - `RenderError` / `ErrorKind` - Error taxonomy for the render path
//! - `RenderPhase` - Request lifecycle tracking

mod context;
mod error;
mod lifecycle;
mod result;

pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use result::*;
