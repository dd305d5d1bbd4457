//! Fixture-backed render environment.

use std::collections::HashMap;

use async_trait::async_trait;
use render_server::{Headers, RenderApi, RenderEnvironment, RenderError, RenderResult};
use serde::{Deserialize, Serialize};

/// A canned response for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// URL this fixture answers.
    pub url: String,

    /// Status code (default: 200).
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response body.
    #[serde(default)]
    pub body: String,

    /// Response headers.
    #[serde(default)]
    pub headers: Headers,

    /// Fail the render with this message instead of responding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_status() -> u16 {
    200
}

/// Render environment answering from configured fixtures.
///
/// URLs without a fixture render a 404.
#[derive(Debug, Default)]
pub struct FixtureEnvironment {
    fixtures: HashMap<String, FixtureConfig>,
}

impl FixtureEnvironment {
    /// Create an environment from fixtures. Later entries win on duplicate URLs.
    pub fn new(fixtures: &[FixtureConfig]) -> Self {
        Self {
            fixtures: fixtures
                .iter()
                .map(|f| (f.url.clone(), f.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl RenderEnvironment for FixtureEnvironment {
    async fn render(&self, url: &str, api: &RenderApi<'_>) -> anyhow::Result<RenderResult> {
        let mut trace = api.trace("fixture_lookup", url);

        let Some(fixture) = self.fixtures.get(url) else {
            trace.add_label("found", false);
            api.logger().debug("No fixture for url");
            return Ok(RenderResult::new(404, format!("No fixture for {url}")));
        };
        trace.add_label("found", true);

        if let Some(message) = &fixture.error {
            return Err(RenderError::transient_service(message.clone())
                .with_metadata("url", url)
                .into());
        }

        Ok(RenderResult {
            body: fixture.body.clone(),
            status: fixture.status,
            headers: fixture.headers.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_server::{BufferedResponse, RenderHandler, RenderRequest};
    use std::sync::Arc;

    fn fixture(url: &str) -> FixtureConfig {
        FixtureConfig {
            url: url.to_string(),
            status: 200,
            body: format!("<p>{url}</p>"),
            headers: Headers::new(),
            error: None,
        }
    }

    async fn render(env: FixtureEnvironment, url: &str) -> BufferedResponse {
        let handler = RenderHandler::builder(Arc::new(env)).build();
        let request = RenderRequest::from_query(&format!("url={url}"), Headers::new());
        let mut response = BufferedResponse::new();
        handler.handle(&request, &mut response).await;
        response
    }

    #[tokio::test]
    async fn test_known_url() {
        let env = FixtureEnvironment::new(&[fixture("/a"), fixture("/b")]);
        let response = render(env, "/b").await;
        assert_eq!(response.status(), Some(200));
        assert_eq!(response.body(), Some("<p>/b</p>"));
    }

    #[tokio::test]
    async fn test_unknown_url_is_404() {
        let env = FixtureEnvironment::new(&[fixture("/a")]);
        let response = render(env, "/missing").await;
        assert_eq!(response.status(), Some(404));
    }

    #[tokio::test]
    async fn test_error_fixture_fails_render() {
        let mut failing = fixture("/a");
        failing.error = Some("cms unavailable".to_string());
        let response = render(FixtureEnvironment::new(&[failing]), "/a").await;
        assert_eq!(response.status(), Some(500));
        assert!(response.body().unwrap().contains("cms unavailable"));
    }

    #[test]
    fn test_fixture_defaults() {
        let fixture: FixtureConfig = toml::from_str(r#"url = "/""#).unwrap();
        assert_eq!(fixture.status, 200);
        assert!(fixture.body.is_empty());
        assert!(fixture.error.is_none());
    }
}
