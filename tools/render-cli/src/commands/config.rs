//! Configuration management commands.

use std::collections::HashSet;
use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig};
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let server = &ctx.config.server;
    ctx.output.info("[server]");
    ctx.output.kv("service_name", &server.service_name);
    if let Some(ref template) = server.default_error_response {
        ctx.output.kv("default_error_response", template);
    }
    if let Some(ref path) = server.default_error_response_path {
        ctx.output
            .kv("default_error_response_path", &path.display().to_string());
    }

    ctx.output.info("[server.logging]");
    ctx.output.kv("level", &server.logging.level.to_string());
    ctx.output.kv(
        "format",
        &format!("{:?}", server.logging.format).to_lowercase(),
    );

    if !ctx.config.fixtures.is_empty() {
        ctx.output.info("Fixtures:");
        for fixture in &ctx.config.fixtures {
            let outcome = match &fixture.error {
                Some(message) => format!("error: {}", message),
                None => fixture.status.to_string(),
            };
            ctx.output
                .list_item(&format!("{} -> {}", fixture.url, outcome));
        }
    }

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let name = ctx
        .cwd
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("render-server");

    fs::write(&config_path, generate_default_config(name))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = check_config(ctx);

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Collect configuration errors and warnings.
fn check_config(ctx: &Context) -> (Vec<String>, Vec<String>) {
    let config: &CliConfig = &ctx.config;
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let mut server = config.server.clone();
    if let Some(path) = &server.default_error_response_path {
        server.default_error_response_path = Some(ctx.resolve_path(path));
    }
    match server.resolve_default_error_response() {
        Ok(Some(template)) if template.trim().is_empty() => warnings
            .push("default error template is blank; the plain error text is used".to_string()),
        Ok(_) => {}
        Err(e) => errors.push(e.to_string()),
    }

    if config.fixtures.is_empty() {
        warnings.push("no fixtures configured; every url renders a 404".to_string());
    }

    let mut seen = HashSet::new();
    for (i, fixture) in config.fixtures.iter().enumerate() {
        if fixture.url.is_empty() {
            errors.push(format!("fixtures[{}].url is required", i));
        }
        if !seen.insert(fixture.url.as_str()) {
            warnings.push(format!(
                "fixtures[{}].url '{}' is duplicated; the last entry wins",
                i, fixture.url
            ));
        }
        if !(100..=599).contains(&fixture.status) {
            errors.push(format!(
                "fixtures[{}].status {} is not a valid HTTP status",
                i, fixture.status
            ));
        }
        if matches!(fixture.status, 301 | 302 | 307 | 308)
            && !fixture
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case("location"))
        {
            warnings.push(format!(
                "fixtures[{}] redirects without a Location header and will fail to render",
                i
            ));
        }
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureConfig;
    use crate::output::Output;

    fn context(config: CliConfig) -> Context {
        Context {
            config,
            config_path: None,
            output: Output::new(false, true),
            cwd: std::env::temp_dir(),
        }
    }

    fn fixture(url: &str, status: u16) -> FixtureConfig {
        FixtureConfig {
            url: url.to_string(),
            status,
            body: String::new(),
            headers: Default::default(),
            error: None,
        }
    }

    #[test]
    fn test_generated_config_is_clean() {
        let config: CliConfig = toml::from_str(&generate_default_config("shop")).unwrap();
        let (errors, warnings) = check_config(&context(config));
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_fixture_problems() {
        let config = CliConfig {
            fixtures: vec![fixture("/a", 200), fixture("/a", 302), fixture("/b", 42)],
            ..Default::default()
        };
        let (errors, warnings) = check_config(&context(config));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("fixtures[2].status"));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_missing_template_file_is_error() {
        let mut config = CliConfig {
            fixtures: vec![fixture("/", 200)],
            ..Default::default()
        };
        config.server.default_error_response_path =
            Some("/nonexistent/render-error.html".into());
        let (errors, _) = check_config(&context(config));
        assert_eq!(errors.len(), 1);
    }
}
