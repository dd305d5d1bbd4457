//! Best-effort error responses.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use render_core::{ErrorKind, Headers, RenderRequest};
use render_observability::StructuredLogger;
use serde_json::Value;

use crate::extract::{RaisedError, SimplifiedError};
use crate::format::format_error;
use crate::response::ResponseSink;

/// Status sent for every failure, whatever its kind.
pub const ERROR_STATUS: u16 = 500;

/// Body and headers replacing the default error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomErrorResponse {
    /// Response body.
    pub body: String,
    /// Headers to add to the response.
    pub headers: Headers,
}

impl CustomErrorResponse {
    /// Create a custom response with the given body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What a custom error hook decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomErrorOutcome {
    /// Send this response instead of the default one.
    Handled(CustomErrorResponse),
    /// Use the default error response.
    Unhandled,
}

/// Hook producing a custom response for a failed render.
#[async_trait]
pub trait ErrorResponder: Send + Sync {
    /// Decide the response for `error`, raised while rendering `url`.
    async fn respond(
        &self,
        url: &str,
        headers: &Headers,
        error: &SimplifiedError,
    ) -> anyhow::Result<CustomErrorOutcome>;
}

/// Settings shared by every error response of a handler.
#[derive(Clone, Copy, Default)]
pub struct ErrorResponseOptions<'a> {
    /// Custom error hook.
    pub responder: Option<&'a dyn ErrorResponder>,
    /// Template for the default error body.
    pub default_error_response: Option<&'a str>,
}

/// Write an error response for `error`.
///
/// The status is always [`ERROR_STATUS`]. A custom hook, if given, may
/// replace the body and add headers; if it fails, the default body
/// describes the hook failure with the original error nested inside.
/// Never fails and always sends a body.
pub async fn handle_error(
    overall_problem: &str,
    options: ErrorResponseOptions<'_>,
    request: &RenderRequest,
    logger: &StructuredLogger,
    response: &mut dyn ResponseSink,
    error: RaisedError,
) {
    response.set_status(ERROR_STATUS);

    let simplified = SimplifiedError::extract(&error);

    if let Some(responder) = options.responder {
        let url = request
            .query_values("url")
            .first()
            .map(String::as_str)
            .unwrap_or_default();

        let outcome = AssertUnwindSafe(responder.respond(url, &request.headers, &simplified))
            .catch_unwind()
            .await;
        let outcome = match outcome {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(RaisedError::Error(err)),
            Err(payload) => Err(RaisedError::Panic(payload)),
        };

        match outcome {
            Ok(CustomErrorOutcome::Handled(custom)) => {
                log_failure(
                    logger,
                    &format!("{overall_problem}. Custom error response generated."),
                    &simplified,
                    None,
                );
                for (name, value) in &custom.headers {
                    response.set_header(name, value);
                }
                response.send(custom.body);
                return;
            }
            Ok(CustomErrorOutcome::Unhandled) => {}
            Err(hook_error) => {
                let secondary = SimplifiedError::extract(&hook_error).with_original(simplified.clone());
                log_failure(
                    logger,
                    &format!("{overall_problem}. Custom error handler failed."),
                    &secondary,
                    Some(&simplified),
                );
                response.send(format_error(options.default_error_response, &secondary));
                return;
            }
        }
    }

    log_failure(logger, overall_problem, &simplified, None);
    response.send(format_error(options.default_error_response, &simplified));
}

fn log_failure(
    logger: &StructuredLogger,
    message: &str,
    error: &SimplifiedError,
    original: Option<&SimplifiedError>,
) {
    let mut fields = HashMap::new();
    fields.insert(
        "kind".to_string(),
        Value::from(ErrorKind::TransientService.as_str()),
    );
    fields.insert("error".to_string(), error.to_value());
    if let Some(original) = original {
        fields.insert("original_error".to_string(), original.to_value());
    }
    logger.error_with_fields(message, fields);
}
