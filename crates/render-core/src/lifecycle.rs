//! Request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases for a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// Request received, processing started.
    Start,
    /// The `url` parameter passed validation.
    Validated,
    /// The render environment has been called.
    Rendering,
    /// The render result passed validation.
    Rendered,
    /// Headers, status and body have been written.
    ResponseSent,
}

impl RenderPhase {
    /// Name used for timing marks and trace labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Validated => "validated",
            Self::Rendering => "rendering",
            Self::Rendered => "rendered",
            Self::ResponseSent => "response_sent",
        }
    }
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    phase: RenderPhase,
    marks: HashMap<&'static str, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            phase: RenderPhase::Start,
            marks: HashMap::new(),
        }
    }

    /// Move to a new phase and record when it was reached.
    pub fn enter(&mut self, phase: RenderPhase) {
        self.phase = phase;
        self.marks.insert(phase.as_str(), Instant::now());
    }

    /// The most recently entered phase.
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from request start until `phase` was entered.
    pub fn time_to(&self, phase: RenderPhase) -> Option<Duration> {
        self.marks
            .get(phase.as_str())
            .map(|t| t.duration_since(self.start))
    }

    /// Time spent inside the render environment.
    pub fn render_duration(&self) -> Option<Duration> {
        let started = self.marks.get(RenderPhase::Rendering.as_str())?;
        let finished = self.marks.get(RenderPhase::Rendered.as_str())?;
        Some(finished.duration_since(*started))
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progression() {
        let mut timing = TimingContext::new();
        assert_eq!(timing.phase(), RenderPhase::Start);
        assert!(timing.time_to(RenderPhase::Validated).is_none());

        timing.enter(RenderPhase::Validated);
        timing.enter(RenderPhase::Rendering);
        assert_eq!(timing.phase(), RenderPhase::Rendering);
        assert!(timing.render_duration().is_none());

        timing.enter(RenderPhase::Rendered);
        assert!(timing.render_duration().is_some());
        assert!(timing.time_to(RenderPhase::Validated).unwrap() <= timing.elapsed());
    }
}
