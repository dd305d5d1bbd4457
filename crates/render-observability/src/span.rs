//! Trace context, spans and scoped trace sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use render_core::{find_header, Headers};

use crate::logging::StructuredLogger;

/// W3C trace context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Trace context for distributed tracing.
///
/// Compatible with W3C Trace Context format.
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// The trace ID (128-bit, hex encoded).
    pub trace_id: String,
    /// The span ID (64-bit, hex encoded).
    pub span_id: String,
    /// Parent span ID if this is a child span.
    pub parent_span_id: Option<String>,
    /// Trace flags (e.g., sampled).
    pub flags: TraceFlags,
}

/// Trace flags indicating sampling decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceFlags {
    /// Whether this trace is sampled.
    pub sampled: bool,
}

impl TraceContext {
    /// Create a new root trace context.
    pub fn new() -> Self {
        Self {
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            parent_span_id: None,
            flags: TraceFlags { sampled: true },
        }
    }

    /// Create a child span from this context.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: generate_span_id(),
            parent_span_id: Some(self.span_id.clone()),
            flags: self.flags,
        }
    }

    /// Continue an inbound trace, or start a new one.
    pub fn from_headers(headers: &Headers) -> Self {
        find_header(headers, TRACEPARENT_HEADER)
            .and_then(Self::from_traceparent)
            .unwrap_or_default()
    }

    /// Parse from W3C traceparent header.
    ///
    /// Format: `{version}-{trace_id}-{span_id}-{flags}`
    /// Example: `00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let parts: Vec<&str> = header.trim().split('-').collect();
        if parts.len() != 4 {
            return None;
        }

        let version = parts[0];
        if version != "00" {
            return None; // Only support version 00
        }

        let trace_id = parts[1].to_string();
        let span_id = parts[2].to_string();
        let flags = u8::from_str_radix(parts[3], 16).unwrap_or(0);

        Some(Self {
            trace_id,
            span_id,
            parent_span_id: None,
            flags: TraceFlags {
                sampled: flags & 0x01 != 0,
            },
        })
    }

    /// Format as W3C traceparent header.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.flags.sampled { "01" } else { "00" };
        format!("00-{}-{}-{}", self.trace_id, self.span_id, flags)
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A span representing a unit of work.
#[derive(Debug, Clone)]
pub struct Span {
    /// Span name (e.g., "render_request", "render").
    pub name: String,
    /// Trace context.
    pub context: TraceContext,
    /// Start time in microseconds since the tracer was created.
    pub start_us: u64,
    /// End time in microseconds (None if still open).
    pub end_us: Option<u64>,
    /// Span attributes.
    pub attributes: Vec<(String, SpanValue)>,
    /// Span status.
    pub status: SpanStatus,
}

/// Span attribute value types.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for SpanValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for SpanValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for SpanValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u16> for SpanValue {
    fn from(v: u16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for SpanValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SpanValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Span status codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

impl Span {
    /// Create a new span.
    pub fn new(name: impl Into<String>, context: TraceContext, start_us: u64) -> Self {
        Self {
            name: name.into(),
            context,
            start_us,
            end_us: None,
            attributes: Vec::new(),
            status: SpanStatus::Unset,
        }
    }

    /// Add an attribute to the span.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<SpanValue>) {
        self.attributes.push((key.into(), value.into()));
    }

    /// Get the most recent value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&SpanValue> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Mark the span as complete.
    pub fn end(&mut self, end_us: u64) {
        self.end_us = Some(end_us);
    }

    /// Set span status to OK.
    pub fn set_ok(&mut self) {
        self.status = SpanStatus::Ok;
    }

    /// Set span status to Error.
    pub fn set_error(&mut self) {
        self.status = SpanStatus::Error;
    }

    /// Get duration in microseconds (None if not ended).
    pub fn duration_us(&self) -> Option<u64> {
        self.end_us.map(|end| end.saturating_sub(self.start_us))
    }
}

/// A named, open span bounding one operation.
pub trait TraceSession: Send {
    /// Annotate the session.
    fn add_label(&mut self, name: &str, value: SpanValue);

    /// Flag the traced operation as failed.
    fn mark_error(&mut self) {}

    /// Close the session.
    fn end(self: Box<Self>);
}

/// Opens trace sessions.
pub trait Tracer: Send + Sync {
    /// Begin a session named `action`, annotated with `message`.
    fn begin(&self, action: &str, message: &str) -> Box<dyn TraceSession>;
}

/// Owns a trace session and ends it exactly once.
///
/// The session ends on [`TraceGuard::end`] or, failing that, when the guard
/// is dropped; early returns and unwinding both close it.
#[must_use = "dropping the guard ends the trace session immediately"]
pub struct TraceGuard {
    session: Option<Box<dyn TraceSession>>,
}

impl TraceGuard {
    /// Take ownership of an open session.
    pub fn new(session: Box<dyn TraceSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Begin a session on `tracer` and guard it.
    pub fn begin(tracer: &dyn Tracer, action: &str, message: &str) -> Self {
        Self::new(tracer.begin(action, message))
    }

    /// Annotate the guarded session.
    pub fn add_label(&mut self, name: &str, value: impl Into<SpanValue>) {
        if let Some(session) = self.session.as_mut() {
            session.add_label(name, value.into());
        }
    }

    /// Flag the guarded operation as failed.
    pub fn mark_error(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.mark_error();
        }
    }

    /// End the session now.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(session) = self.session.take() {
            session.end();
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for TraceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceGuard")
            .field("open", &self.session.is_some())
            .finish()
    }
}

/// Collects ended spans.
#[derive(Debug, Clone, Default)]
pub struct SpanRecorder {
    spans: Arc<Mutex<Vec<Span>>>,
}

impl SpanRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, span: Span) {
        self.spans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(span);
    }

    /// All ended spans, in the order they ended.
    pub fn spans(&self) -> Vec<Span> {
        self.spans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Ended spans with the given name.
    pub fn named(&self, name: &str) -> Vec<Span> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }
}

/// Default tracer: every session is a child span of one request trace.
#[derive(Debug, Clone)]
pub struct SpanTracer {
    context: TraceContext,
    origin: Instant,
    logger: Option<StructuredLogger>,
    recorder: Option<SpanRecorder>,
}

impl SpanTracer {
    /// Create a tracer for the given trace.
    pub fn new(context: TraceContext) -> Self {
        Self {
            context,
            origin: Instant::now(),
            logger: None,
            recorder: None,
        }
    }

    /// Log span completion through `logger` at debug level.
    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Push ended spans into `recorder`.
    pub fn with_recorder(mut self, recorder: SpanRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The trace this tracer contributes to.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl Tracer for SpanTracer {
    fn begin(&self, action: &str, message: &str) -> Box<dyn TraceSession> {
        let mut span = Span::new(action, self.context.child(), self.now_us());
        span.set_attribute("message", message);
        Box::new(SpanSession {
            span,
            origin: self.origin,
            logger: self.logger.clone(),
            recorder: self.recorder.clone(),
        })
    }
}

struct SpanSession {
    span: Span,
    origin: Instant,
    logger: Option<StructuredLogger>,
    recorder: Option<SpanRecorder>,
}

impl TraceSession for SpanSession {
    fn add_label(&mut self, name: &str, value: SpanValue) {
        self.span.set_attribute(name, value);
    }

    fn mark_error(&mut self) {
        self.span.set_error();
    }

    fn end(self: Box<Self>) {
        let SpanSession {
            mut span,
            origin,
            logger,
            recorder,
        } = *self;

        span.end(origin.elapsed().as_micros() as u64);
        if span.status == SpanStatus::Unset {
            span.set_ok();
        }

        if let Some(logger) = logger {
            logger
                .debug_builder("Trace span ended")
                .field("span", span.name.clone())
                .field("span_id", span.context.span_id.clone())
                .field_i64("duration_us", span.duration_us().unwrap_or(0) as i64)
                .field_bool("error", span.status == SpanStatus::Error)
                .emit();
        }

        if let Some(recorder) = recorder {
            recorder.push(span);
        }
    }
}

// Simple ID generation (not cryptographically secure, but good enough for tracing)
fn generate_trace_id() -> String {
    format!("{:016x}{:016x}", simple_random_u64(), simple_random_u64())
}

fn generate_span_id() -> String {
    format!("{:016x}", simple_random_u64())
}

fn simple_random_u64() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    let count = COUNTER.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    time ^ count.wrapping_mul(0x517cc1b727220a95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSession {
        ended: Arc<AtomicUsize>,
    }

    impl TraceSession for CountingSession {
        fn add_label(&mut self, _name: &str, _value: SpanValue) {}

        fn end(self: Box<Self>) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_traceparent_round_trip() {
        let header = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let ctx = TraceContext::from_traceparent(header).unwrap();
        assert_eq!(ctx.trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert!(ctx.flags.sampled);
        assert_eq!(ctx.to_traceparent(), header);
    }

    #[test]
    fn test_traceparent_rejects_unknown_version() {
        assert!(TraceContext::from_traceparent("01-a-b-01").is_none());
        assert!(TraceContext::from_traceparent("garbage").is_none());
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = Headers::new();
        headers.insert(
            "Traceparent".to_string(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-00".to_string(),
        );
        let ctx = TraceContext::from_headers(&headers);
        assert_eq!(ctx.trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert!(!ctx.flags.sampled);

        let fresh = TraceContext::from_headers(&Headers::new());
        assert_eq!(fresh.trace_id.len(), 32);
    }

    #[test]
    fn test_guard_ends_once_on_drop() {
        let ended = Arc::new(AtomicUsize::new(0));
        {
            let _guard = TraceGuard::new(Box::new(CountingSession {
                ended: ended.clone(),
            }));
        }
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_explicit_end_does_not_double_end() {
        let ended = Arc::new(AtomicUsize::new(0));
        let guard = TraceGuard::new(Box::new(CountingSession {
            ended: ended.clone(),
        }));
        guard.end();
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_ends_during_unwind() {
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = ended.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = TraceGuard::new(Box::new(CountingSession { ended: counter }));
            panic!("render blew up");
        });
        assert!(result.is_err());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_span_tracer_records_children() {
        let recorder = SpanRecorder::new();
        let tracer = SpanTracer::new(TraceContext::new()).with_recorder(recorder.clone());

        let mut guard = TraceGuard::begin(&tracer, "render", "/foo");
        guard.add_label("status", 200u16);
        guard.end();

        let mut failed = TraceGuard::begin(&tracer, "render", "/bar");
        failed.mark_error();
        drop(failed);

        let spans = recorder.named("render");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].attribute("message"), Some(&SpanValue::from("/foo")));
        assert_eq!(spans[0].attribute("status"), Some(&SpanValue::Int(200)));
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[1].status, SpanStatus::Error);
        assert_eq!(spans[0].context.trace_id, tracer.context().trace_id);
        assert_eq!(
            spans[0].context.parent_span_id.as_deref(),
            Some(tracer.context().span_id.as_str())
        );
        assert!(spans[0].duration_us().is_some());
    }
}
