//! Error taxonomy for the render path.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why an operation on the render path failed.
///
/// Every kind collapses to HTTP 500 at the response boundary; the kind is
/// only visible in logs and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request (missing or duplicated `url` parameter).
    InvalidInput,
    /// The render environment produced something it must not.
    NotAllowed,
    /// Render or custom error handler failure.
    TransientService,
    /// Value of unknown shape.
    Internal,
}

impl ErrorKind {
    /// Stable name used in logs and trace labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::NotAllowed => "NotAllowed",
            Self::TransientService => "TransientService",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised on the render path, tagged with its kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RenderError {
    kind: ErrorKind,
    message: String,
    metadata: Map<String, Value>,
}

impl RenderError {
    /// Create a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    /// Malformed request.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Disallowed output from a collaborator.
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAllowed, message)
    }

    /// Service failure.
    pub fn transient_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientService, message)
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Additional structured metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_message() {
        let err = RenderError::invalid_input("Missing url query param");
        assert_eq!(err.to_string(), "Missing url query param");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_error_metadata() {
        let err = RenderError::not_allowed("Redirect without Location")
            .with_metadata("status", 301)
            .with_metadata("url", "/foo");
        assert_eq!(err.metadata().get("status"), Some(&Value::from(301)));
        assert_eq!(err.metadata().get("url"), Some(&Value::from("/foo")));
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::TransientService).unwrap();
        assert_eq!(json, "\"TransientService\"");
        assert_eq!(ErrorKind::NotAllowed.to_string(), "NotAllowed");
    }
}
