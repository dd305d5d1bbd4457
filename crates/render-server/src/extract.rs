//! Normalizing raised errors into a loggable shape.

use std::any::Any;
use std::backtrace::BacktraceStatus;

use render_core::{ErrorKind, RenderError};
use serde::Serialize;
use serde_json::{Map, Value};

/// Anything a collaborator can raise: an error, or a panic payload.
#[derive(Debug)]
pub enum RaisedError {
    /// A returned error.
    Error(anyhow::Error),
    /// A caught panic.
    Panic(Box<dyn Any + Send>),
}

impl From<anyhow::Error> for RaisedError {
    fn from(err: anyhow::Error) -> Self {
        Self::Error(err)
    }
}

impl From<RenderError> for RaisedError {
    fn from(err: RenderError) -> Self {
        Self::Error(anyhow::Error::new(err))
    }
}

/// Field names metadata may not take over when serialized alongside them.
const RESERVED_FIELDS: [&str; 4] = ["message", "kind", "stack", "original_error"];

/// Normalized error: message, kind, optional stack and metadata.
///
/// Built once per failure; there are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifiedError {
    message: String,
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
    #[serde(flatten)]
    metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_error: Option<Box<SimplifiedError>>,
}

impl SimplifiedError {
    /// Create a new simplified error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            stack: None,
            metadata: Map::new(),
            original_error: None,
        }
    }

    /// Normalize any raised value.
    pub fn extract(raised: &RaisedError) -> Self {
        match raised {
            RaisedError::Error(err) => Self::from_error(err),
            RaisedError::Panic(payload) => Self::from_panic(&**payload),
        }
    }

    /// Normalize an error.
    ///
    /// The kind and metadata come from the first [`RenderError`] in the
    /// cause chain; errors of any other type get [`ErrorKind::Internal`].
    pub fn from_error(err: &anyhow::Error) -> Self {
        let tagged = err.chain().find_map(|cause| cause.downcast_ref::<RenderError>());
        let (kind, mut metadata) = match tagged {
            Some(render_err) => (render_err.kind(), render_err.metadata().clone()),
            None => (ErrorKind::Internal, Map::new()),
        };
        metadata.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));

        let causes: Vec<Value> = err
            .chain()
            .skip(1)
            .map(|cause| Value::from(cause.to_string()))
            .collect();
        if !causes.is_empty() {
            metadata.insert("causes".to_string(), Value::Array(causes));
        }

        let backtrace = err.backtrace();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            message: err.to_string(),
            kind,
            stack,
            metadata,
            original_error: None,
        }
    }

    /// Normalize a panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        let mut err = Self::new(ErrorKind::Internal, message);
        err.metadata.insert("panic".to_string(), Value::Bool(true));
        err
    }

    /// Nest the error this one occurred while handling.
    pub fn with_original(mut self, original: SimplifiedError) -> Self {
        self.original_error = Some(Box::new(original));
        self
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Captured stack, if any.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Additional structured metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// The error being handled when this one occurred.
    pub fn original_error(&self) -> Option<&SimplifiedError> {
        self.original_error.as_deref()
    }

    /// JSON form for log fields.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::from(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_extract_render_error_keeps_kind() {
        let err = anyhow::Error::new(
            RenderError::not_allowed("Redirect without Location").with_metadata("status", 301),
        );
        let simplified = SimplifiedError::from_error(&err);
        assert_eq!(simplified.kind(), ErrorKind::NotAllowed);
        assert_eq!(simplified.message(), "Redirect without Location");
        assert_eq!(simplified.metadata().get("status"), Some(&Value::from(301)));
    }

    #[test]
    fn test_extract_plain_error_is_internal() {
        let simplified = SimplifiedError::from_error(&anyhow::anyhow!("boom"));
        assert_eq!(simplified.kind(), ErrorKind::Internal);
        assert_eq!(simplified.message(), "boom");
        assert!(simplified.metadata().get("causes").is_none());
    }

    #[test]
    fn test_extract_context_chain() {
        let err = Err::<(), _>(RenderError::transient_service("upstream timed out"))
            .context("fetching product")
            .unwrap_err();
        let simplified = SimplifiedError::from_error(&err);
        assert_eq!(simplified.message(), "fetching product");
        assert_eq!(simplified.kind(), ErrorKind::TransientService);
        assert_eq!(
            simplified.metadata().get("causes"),
            Some(&serde_json::json!(["upstream timed out"]))
        );
    }

    #[test]
    fn test_extract_panic_payloads() {
        let from_str = SimplifiedError::extract(&RaisedError::Panic(Box::new("oh no")));
        assert_eq!(from_str.message(), "oh no");
        assert_eq!(from_str.kind(), ErrorKind::Internal);

        let from_string =
            SimplifiedError::extract(&RaisedError::Panic(Box::new(String::from("index out"))));
        assert_eq!(from_string.message(), "index out");

        let unknown = SimplifiedError::extract(&RaisedError::Panic(Box::new(42_u8)));
        assert_eq!(unknown.message(), "Unknown panic");
        assert_eq!(unknown.metadata().get("panic"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_serialized_shape() {
        let original = SimplifiedError::new(ErrorKind::TransientService, "boom");
        let secondary =
            SimplifiedError::new(ErrorKind::Internal, "hook failed").with_original(original);

        let value = secondary.to_value();
        assert_eq!(value["message"], "hook failed");
        assert_eq!(value["kind"], "Internal");
        assert_eq!(value["original_error"]["message"], "boom");
        assert!(value.get("stack").is_none());
    }

    #[test]
    fn test_metadata_cannot_replace_message_or_kind() {
        let err = anyhow::Error::new(
            RenderError::transient_service("cms timed out")
                .with_metadata("message", "spoofed")
                .with_metadata("kind", "Internal")
                .with_metadata("stack", "fake")
                .with_metadata("region", "eu-west"),
        );
        let simplified = SimplifiedError::from_error(&err);
        assert!(simplified.metadata().get("message").is_none());
        assert!(simplified.metadata().get("kind").is_none());

        let value = simplified.to_value();
        assert_eq!(value["message"], "cms timed out");
        assert_eq!(value["kind"], "TransientService");
        assert_eq!(value["region"], "eu-west");
        assert_ne!(value.get("stack"), Some(&Value::from("fake")));
    }
}
