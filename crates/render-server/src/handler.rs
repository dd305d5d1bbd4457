//! The render request handler.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use render_core::{RenderPhase, RenderRequest, RenderResult, TimingContext};
use render_observability::{
    LogLevel, LogSink, SpanRecorder, SpanTracer, StructuredLogger, TraceContext, TraceGuard,
    Tracer, TracingSink,
};

use crate::config::{ConfigError, RenderServerConfig};
use crate::environment::{RenderApi, RenderEnvironment};
use crate::error_handler::{handle_error, ErrorResponder, ErrorResponseOptions};
use crate::extract::RaisedError;
use crate::response::{BufferedResponse, ResponseSink};

/// Name of the request-scoped trace session.
pub const REQUEST_SPAN: &str = "render_request";

/// Name of the trace session around the render call.
pub const RENDER_SPAN: &str = "render";

const DEFAULT_SERVICE_NAME: &str = "render-server";

/// Handles render requests: validate, render, respond.
///
/// Every failure ends in a 500 written by [`handle_error`].
pub struct RenderHandler {
    environment: Arc<dyn RenderEnvironment>,
    error_responder: Option<Arc<dyn ErrorResponder>>,
    default_error_response: Option<String>,
    service_name: String,
    log_level: LogLevel,
    log_sink: Arc<dyn LogSink>,
    tracer: Option<Arc<dyn Tracer>>,
    span_recorder: Option<SpanRecorder>,
}

impl RenderHandler {
    /// Start building a handler around `environment`.
    pub fn builder(environment: Arc<dyn RenderEnvironment>) -> RenderHandlerBuilder {
        RenderHandlerBuilder::new(environment)
    }

    /// Handle one request, writing the outcome to `response`.
    pub async fn handle(&self, request: &RenderRequest, response: &mut dyn ResponseSink) {
        let logger = StructuredLogger::new(request.request_id.clone())
            .with_service(self.service_name.clone())
            .with_min_level(self.log_level)
            .with_sink(self.log_sink.clone());

        let span_tracer;
        let tracer: &dyn Tracer = match &self.tracer {
            Some(tracer) => tracer.as_ref(),
            None => {
                span_tracer = self.span_tracer(request, &logger);
                &span_tracer
            }
        };

        let mut timing = TimingContext::new();
        let mut request_trace =
            TraceGuard::begin(tracer, REQUEST_SPAN, "Handling render request");

        match self.render(request, tracer, &logger, &mut timing).await {
            Ok(result) => {
                let status = result.status;
                write_result(response, result);
                timing.enter(RenderPhase::ResponseSent);

                let mut entry = logger
                    .info_builder("Render complete")
                    .field_i64("status", i64::from(status));
                if let Some(duration) = timing.render_duration() {
                    entry = entry.duration_ms("render_ms", duration);
                }
                entry.duration_ms("total_ms", timing.elapsed()).emit();
            }
            Err(error) => {
                request_trace.mark_error();
                request_trace.add_label("failed_phase", timing.phase().as_str());
                handle_error(
                    "Render failed",
                    self.error_options(),
                    request,
                    &logger,
                    response,
                    error,
                )
                .await;
            }
        }

        request_trace.end();
    }

    /// Handle an `http::Request`, producing an `http::Response`.
    pub async fn handle_http<B>(&self, request: http::Request<B>) -> http::Response<String> {
        let request = RenderRequest::from_http(&request);
        let mut response = BufferedResponse::new();
        self.handle(&request, &mut response).await;
        response.into_http()
    }

    async fn render(
        &self,
        request: &RenderRequest,
        tracer: &dyn Tracer,
        logger: &StructuredLogger,
        timing: &mut TimingContext,
    ) -> Result<RenderResult, RaisedError> {
        let url = request.render_url()?;
        timing.enter(RenderPhase::Validated);

        let logger = logger.clone().with_url(url);
        let mut trace = TraceGuard::begin(tracer, RENDER_SPAN, url);
        trace.add_label("url", url);

        let api = RenderApi::new(&request.headers, &logger, tracer);
        timing.enter(RenderPhase::Rendering);
        logger.debug("Rendering");

        let rendered = match AssertUnwindSafe(self.environment.render(url, &api))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result.validate().map(|()| result).map_err(RaisedError::from),
            Ok(Err(err)) => Err(RaisedError::Error(err)),
            Err(payload) => Err(RaisedError::Panic(payload)),
        };

        match rendered {
            Ok(result) => {
                timing.enter(RenderPhase::Rendered);
                trace.add_label("status", result.status);
                for (name, value) in &result.headers {
                    trace.add_label(&format!("header.{}", name.to_lowercase()), value.as_str());
                }
                trace.end();
                Ok(result)
            }
            Err(error) => {
                trace.mark_error();
                trace.end();
                Err(error)
            }
        }
    }

    fn span_tracer(&self, request: &RenderRequest, logger: &StructuredLogger) -> SpanTracer {
        let tracer =
            SpanTracer::new(TraceContext::from_headers(&request.headers)).with_logger(logger.clone());
        match &self.span_recorder {
            Some(recorder) => tracer.with_recorder(recorder.clone()),
            None => tracer,
        }
    }

    fn error_options(&self) -> ErrorResponseOptions<'_> {
        ErrorResponseOptions {
            responder: self.error_responder.as_deref(),
            default_error_response: self.default_error_response.as_deref(),
        }
    }
}

/// Headers, then status, then body.
fn write_result(response: &mut dyn ResponseSink, result: RenderResult) {
    for (name, value) in &result.headers {
        response.set_header(name, value);
    }
    response.set_status(result.status);
    response.send(result.body);
}

/// Builder for [`RenderHandler`].
pub struct RenderHandlerBuilder {
    handler: RenderHandler,
}

impl RenderHandlerBuilder {
    /// Create a builder with default settings.
    pub fn new(environment: Arc<dyn RenderEnvironment>) -> Self {
        Self {
            handler: RenderHandler {
                environment,
                error_responder: None,
                default_error_response: None,
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                log_level: LogLevel::Info,
                log_sink: Arc::new(TracingSink::default()),
                tracer: None,
                span_recorder: None,
            },
        }
    }

    /// Apply service name, logging and default error settings from `config`.
    pub fn config(mut self, config: &RenderServerConfig) -> Result<Self, ConfigError> {
        self.handler.default_error_response = config.resolve_default_error_response()?;
        self.handler.service_name = config.service_name.clone();
        self.handler.log_level = config.logging.level;
        self.handler.log_sink = Arc::new(TracingSink::new(config.logging.format));
        Ok(self)
    }

    /// Hook for custom error responses.
    pub fn error_responder(mut self, responder: Arc<dyn ErrorResponder>) -> Self {
        self.handler.error_responder = Some(responder);
        self
    }

    /// Template for the default error body.
    pub fn default_error_response(mut self, template: impl Into<String>) -> Self {
        self.handler.default_error_response = Some(template.into());
        self
    }

    /// Service name attached to log entries.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.handler.service_name = name.into();
        self
    }

    /// Minimum level of emitted log entries.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.handler.log_level = level;
        self
    }

    /// Destination of log entries.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.handler.log_sink = sink;
        self
    }

    /// Use `tracer` for every request instead of a per-request span tracer.
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.handler.tracer = Some(tracer);
        self
    }

    /// Collect spans ended by the per-request span tracer.
    pub fn span_recorder(mut self, recorder: SpanRecorder) -> Self {
        self.handler.span_recorder = Some(recorder);
        self
    }

    /// Finish building.
    pub fn build(self) -> RenderHandler {
        self.handler
    }
}
