//! Render environment output.

use serde::{Deserialize, Serialize};

use crate::context::{find_header, Headers};
use crate::error::RenderError;

/// Status codes that must carry a `Location` header.
pub const REDIRECT_STATUSES: [u16; 4] = [301, 302, 307, 308];

/// The result of rendering a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Response body.
    #[serde(default)]
    pub body: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
}

impl RenderResult {
    /// Create a new result.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            status,
            headers: Headers::new(),
        }
    }

    /// A 200 result with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// A redirect result pointing at `location`.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::new(status, "").with_header("Location", location)
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the status is one of the redirect codes.
    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    /// Check the result is sendable.
    ///
    /// A redirect without a `Location` header is a render environment bug.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(100..=599).contains(&self.status) {
            return Err(RenderError::not_allowed(format!(
                "Render result status {} is not a valid HTTP status",
                self.status
            ))
            .with_metadata("status", self.status));
        }

        if self.is_redirect() && self.header("Location").is_none() {
            return Err(RenderError::not_allowed(format!(
                "Redirect response with status {} is missing a Location header",
                self.status
            ))
            .with_metadata("status", self.status));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_plain_result_is_valid() {
        assert!(RenderResult::ok("X").validate().is_ok());
        assert!(RenderResult::new(404, "nope").validate().is_ok());
    }

    #[test]
    fn test_redirect_without_location_not_allowed() {
        for status in REDIRECT_STATUSES {
            let err = RenderResult::new(status, "").validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotAllowed);
        }
    }

    #[test]
    fn test_redirect_with_location_is_valid() {
        for status in REDIRECT_STATUSES {
            assert!(RenderResult::redirect(status, "/elsewhere").validate().is_ok());
        }
    }

    #[test]
    fn test_location_lookup_case_insensitive() {
        let result = RenderResult::new(302, "").with_header("location", "/x");
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_other_3xx_needs_no_location() {
        assert!(RenderResult::new(304, "").validate().is_ok());
        assert!(RenderResult::new(303, "").validate().is_ok());
    }

    #[test]
    fn test_status_out_of_range() {
        assert!(RenderResult::new(99, "").validate().is_err());
        assert!(RenderResult::new(600, "").validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let result: RenderResult = serde_json::from_str(r#"{"status": 204}"#).unwrap();
        assert_eq!(result.status, 204);
        assert!(result.body.is_empty());
        assert!(result.headers.is_empty());
    }
}
