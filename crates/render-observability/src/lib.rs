//! Observability infrastructure for the render server.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging with request context
//! - `LogSink` - Where log entries go (`tracing` events, or memory for tests)
//! - `Tracer` / `TraceSession` / `TraceGuard` - Scoped trace sessions
//! - `SpanTracer` - Default tracer built on W3C trace context

mod logging;
mod span;

pub use logging::*;
pub use span::*;

// Re-export RequestId from render-core for convenience
pub use render_core::RequestId;
