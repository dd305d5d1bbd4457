//! Inbound render request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::RenderError;

/// Header carrying an upstream request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let id = format!(
            "{:x}-{:x}-{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            next_sequence(),
            next_sequence()
        );
        Self(id)
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

fn next_sequence() -> u32 {
    static SEED: AtomicU32 = AtomicU32::new(12345);
    SEED.fetch_add(1, Ordering::Relaxed)
        .wrapping_mul(1103515245)
        .wrapping_add(12345)
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Query string parameters. A name given more than once keeps every value.
pub type QueryParams = HashMap<String, Vec<String>>;

/// HTTP headers.
pub type Headers = HashMap<String, String>;

/// Case-insensitive header lookup.
pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Decode a raw query string into multi-valued parameters.
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (name, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        params
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

/// Immutable view of an inbound render request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Query string parameters.
    pub query: QueryParams,
    /// HTTP headers, passed through to the render call.
    pub headers: Headers,
}

impl RenderRequest {
    /// Build a request from a raw query string and headers.
    pub fn from_query(query: &str, headers: Headers) -> Self {
        Self::from_params(parse_query(query), headers)
    }

    /// Build a request from decoded query parameters and headers.
    ///
    /// The request id comes from the `x-request-id` header, or is generated.
    pub fn from_params(query: QueryParams, headers: Headers) -> Self {
        let request_id = find_header(&headers, REQUEST_ID_HEADER)
            .map(RequestId::from_string)
            .unwrap_or_else(RequestId::generate);
        Self {
            request_id,
            query,
            headers,
        }
    }

    /// Build a request from an `http::Request`.
    ///
    /// Repeated headers are joined with `", "`. Values are decoded as UTF-8,
    /// with invalid bytes replaced.
    pub fn from_http<B>(req: &http::Request<B>) -> Self {
        let mut headers = Headers::new();
        for (name, value) in req.headers() {
            let value = String::from_utf8_lossy(value.as_bytes());
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert_with(|| value.into_owned());
        }
        Self::from_query(req.uri().query().unwrap_or_default(), headers)
    }

    /// Get the values of a query parameter.
    pub fn query_values(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The URL to render.
    ///
    /// The `url` query parameter must be present exactly once.
    pub fn render_url(&self) -> Result<&str, RenderError> {
        match self.query_values("url") {
            [] => Err(RenderError::invalid_input("Missing url query param")),
            [url] => Ok(url.as_str()),
            _ => Err(RenderError::invalid_input(
                "More than one url query param given",
            )),
        }
    }
}
