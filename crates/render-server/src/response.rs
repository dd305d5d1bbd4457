//! Outbound response abstraction.

use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use render_core::{find_header, Headers};

/// Where the handler writes its response.
///
/// Headers are written before the status, and the status before the body.
pub trait ResponseSink: Send {
    /// Set a response header.
    fn set_header(&mut self, name: &str, value: &str);

    /// Set the status code.
    fn set_status(&mut self, status: u16);

    /// Send the body, completing the response.
    fn send(&mut self, body: String);
}

/// A write made to a [`BufferedResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOp {
    Header(String, String),
    Status(u16),
    Body(String),
}

/// In-memory response that remembers the order of writes.
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    ops: Vec<ResponseOp>,
    status: Option<u16>,
    headers: Headers,
    body: Option<String>,
}

impl BufferedResponse {
    /// Create an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// The status code, if one was set.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// All headers set so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body, once sent.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Whether the body has been sent.
    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    /// Every write, in order.
    pub fn operations(&self) -> &[ResponseOp] {
        &self.ops
    }

    /// Convert into an `http::Response`.
    ///
    /// Headers that are not valid HTTP are dropped. A missing status means
    /// 200, an invalid one 500.
    pub fn into_http(self) -> http::Response<String> {
        let mut response = http::Response::new(self.body.unwrap_or_default());
        *response.status_mut() = match self.status {
            None => StatusCode::OK,
            Some(status) => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            response.headers_mut().insert(name, value);
        }

        response
    }
}

impl ResponseSink for BufferedResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.ops
            .push(ResponseOp::Header(name.to_string(), value.to_string()));
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn set_status(&mut self, status: u16) {
        self.ops.push(ResponseOp::Status(status));
        self.status = Some(status);
    }

    fn send(&mut self, body: String) {
        self.ops.push(ResponseOp::Body(body.clone()));
        // The first send completes the response.
        if self.body.is_none() {
            self.body = Some(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_write_order() {
        let mut res = BufferedResponse::new();
        res.set_header("Content-Type", "text/html");
        res.set_status(200);
        res.send("X".to_string());

        assert_eq!(
            res.operations(),
            &[
                ResponseOp::Header("Content-Type".to_string(), "text/html".to_string()),
                ResponseOp::Status(200),
                ResponseOp::Body("X".to_string()),
            ]
        );
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert!(res.is_sent());
    }

    #[test]
    fn test_first_send_wins() {
        let mut res = BufferedResponse::new();
        res.send("first".to_string());
        res.send("second".to_string());
        assert_eq!(res.body(), Some("first"));
    }

    #[test]
    fn test_into_http() {
        let mut res = BufferedResponse::new();
        res.set_header("Location", "/elsewhere");
        res.set_header("bad header", "x");
        res.set_status(301);
        res.send(String::new());

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(http.headers()["location"], "/elsewhere");
        assert_eq!(http.headers().len(), 1);
    }

    #[test]
    fn test_into_http_defaults() {
        let http = BufferedResponse::new().into_http();
        assert_eq!(http.status(), StatusCode::OK);
        assert!(http.body().is_empty());
    }
}
