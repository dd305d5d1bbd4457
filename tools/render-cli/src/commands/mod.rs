//! CLI command implementations.

pub mod config;
pub mod render;

use clap::{Args, Subcommand};

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// URL to render. Repeat to exercise the duplicate-url check.
    #[arg(short, long)]
    pub url: Vec<String>,

    /// Request header as `name=value`. May be repeated.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

/// Parse a `name=value` header argument.
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid header `{s}`: expected name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header `{s}`: empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("x-request-id=abc").unwrap(),
            ("x-request-id".to_string(), "abc".to_string())
        );
        assert_eq!(
            parse_header("accept = text/html").unwrap(),
            ("accept".to_string(), "text/html".to_string())
        );
        assert_eq!(
            parse_header("cookie=a=b").unwrap(),
            ("cookie".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_parse_header_invalid() {
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
    }
}
