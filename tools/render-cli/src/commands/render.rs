//! Render a URL through the fixture environment.

use std::sync::Arc;

use anyhow::Result;
use render_core::QueryParams;
use render_server::{BufferedResponse, Headers, RenderHandler, RenderRequest};
use serde_json::json;

use super::RenderArgs;
use crate::context::Context;
use crate::fixtures::FixtureEnvironment;
use crate::output::{status_badge, Output};

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let handler = build_handler(ctx)?;
    let request = build_request(args);

    ctx.output
        .debug(&format!("Request ID: {}", request.request_id));

    let mut response = BufferedResponse::new();
    handler.handle(&request, &mut response).await;

    print_response(&ctx.output, &request, &response);

    Ok(())
}

fn build_handler(ctx: &Context) -> Result<RenderHandler> {
    let mut server = ctx.config.server.clone();
    if let Some(path) = &server.default_error_response_path {
        server.default_error_response_path = Some(ctx.resolve_path(path));
    }

    let environment = Arc::new(FixtureEnvironment::new(&ctx.config.fixtures));
    Ok(RenderHandler::builder(environment).config(&server)?.build())
}

fn build_request(args: RenderArgs) -> RenderRequest {
    let headers: Headers = args.headers.into_iter().collect();

    let mut query = QueryParams::new();
    if !args.url.is_empty() {
        query.insert("url".to_string(), args.url);
    }

    RenderRequest::from_params(query, headers)
}

fn print_response(output: &Output, request: &RenderRequest, response: &BufferedResponse) {
    let status = response.status().unwrap_or(200);

    if output.is_json() {
        output.json(&json!({
            "request_id": request.request_id.to_string(),
            "status": status,
            "headers": response.headers(),
            "body": response.body(),
        }));
        return;
    }

    output.header(&format!("Response {}", status_badge(status)));
    let mut headers: Vec<_> = response.headers().iter().collect();
    headers.sort();
    for (name, value) in headers {
        output.kv(name, value);
    }
    if let Some(body) = response.body() {
        output.raw("");
        output.raw(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_keeps_every_url() {
        let request = build_request(RenderArgs {
            url: vec!["/a".to_string(), "/b".to_string()],
            headers: vec![("X-Request-Id".to_string(), "req-7".to_string())],
        });
        assert_eq!(request.query_values("url"), ["/a", "/b"]);
        assert_eq!(request.request_id.to_string(), "req-7");
        assert!(request.render_url().is_err());
    }

    #[test]
    fn test_build_request_without_url() {
        let request = build_request(RenderArgs {
            url: Vec::new(),
            headers: Vec::new(),
        });
        assert!(request.query_values("url").is_empty());
        assert!(!request.request_id.to_string().is_empty());
    }
}
