//! Render environment interface.

use async_trait::async_trait;
use render_core::{Headers, RenderResult};
use render_observability::{StructuredLogger, TraceGuard, Tracer};

/// Capabilities handed to a render environment for one render call.
///
/// Borrowed from the handler, so it cannot outlive the call.
#[derive(Clone, Copy)]
pub struct RenderApi<'a> {
    headers: &'a Headers,
    logger: &'a StructuredLogger,
    tracer: &'a dyn Tracer,
}

impl<'a> RenderApi<'a> {
    /// Create a new render API.
    pub fn new(headers: &'a Headers, logger: &'a StructuredLogger, tracer: &'a dyn Tracer) -> Self {
        Self {
            headers,
            logger,
            tracer,
        }
    }

    /// Headers of the inbound request, unmodified.
    pub fn headers(&self) -> &'a Headers {
        self.headers
    }

    /// Request-scoped logger.
    pub fn logger(&self) -> &'a StructuredLogger {
        self.logger
    }

    /// Begin a trace session nested in the current request.
    pub fn trace(&self, action: &str, message: &str) -> TraceGuard {
        TraceGuard::begin(self.tracer, action, message)
    }
}

impl std::fmt::Debug for RenderApi<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderApi")
            .field("headers", self.headers)
            .field("request_id", self.logger.request_id())
            .finish()
    }
}

/// Turns a URL into a [`RenderResult`].
///
/// # Example
///
/// ```rust,ignore
/// struct Static;
///
/// #[async_trait]
/// impl RenderEnvironment for Static {
///     async fn render(&self, url: &str, api: &RenderApi<'_>) -> anyhow::Result<RenderResult> {
///         api.logger().info("rendering");
///         Ok(RenderResult::ok(format!("<h1>{url}</h1>")))
///     }
/// }
/// ```
#[async_trait]
pub trait RenderEnvironment: Send + Sync {
    /// Render `url`.
    async fn render(&self, url: &str, api: &RenderApi<'_>) -> anyhow::Result<RenderResult>;
}
