//! CLI configuration.

use anyhow::{Context, Result};
use render_server::RenderServerConfig;
use serde::{Deserialize, Serialize};

use crate::fixtures::FixtureConfig;

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Render server configuration.
    #[serde(default)]
    pub server: RenderServerConfig,

    /// Canned responses served by the fixture environment.
    #[serde(default)]
    pub fixtures: Vec<FixtureConfig>,
}

impl CliConfig {
    /// Load config from a TOML file, or JSON if the path ends in `.json`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))?
        };

        config
            .server
            .validate()
            .with_context(|| format!("Invalid config: {}", path))?;
        Ok(config)
    }
}

/// Generate a default render.toml config file.
pub fn generate_default_config(service_name: &str) -> String {
    format!(
        r#"# Render server configuration

[server]
service_name = "{service_name}"
# default_error_response = "<h1>{{{{kind}}}}</h1><p>{{{{message}}}}</p>"
# default_error_response_path = "error.html"

[server.logging]
level = "info"
format = "human"

[[fixtures]]
url = "/"
status = 200
body = "<h1>Home</h1>"

[[fixtures]]
url = "/old-home"
status = 301
headers = {{ Location = "/" }}

[[fixtures]]
url = "/broken"
error = "Upstream CMS unavailable"
"#,
        service_name = service_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config("storefront")).unwrap();
        assert_eq!(config.server.service_name, "storefront");
        assert!(config.server.default_error_response.is_none());
        assert_eq!(config.fixtures.len(), 3);
        assert_eq!(config.fixtures[1].status, 301);
        assert_eq!(
            config.fixtures[1].headers.get("Location").map(String::as_str),
            Some("/")
        );
        assert_eq!(
            config.fixtures[2].error.as_deref(),
            Some("Upstream CMS unavailable")
        );
    }

    #[test]
    fn test_load_validates_server_settings() {
        let dir = std::env::temp_dir().join(format!("render-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let invalid = dir.join("invalid.toml");
        std::fs::write(&invalid, "[server]\nservice_name = \"  \"\n").unwrap();
        let err = CliConfig::load(invalid.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("service_name must not be empty"));

        let valid = dir.join("valid.json");
        std::fs::write(&valid, r#"{"server": {"service_name": "shop"}}"#).unwrap();
        let config = CliConfig::load(valid.to_str().unwrap()).unwrap();
        assert_eq!(config.server.service_name, "shop");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let err = CliConfig::load("/nonexistent/render.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/render.toml"));
    }

    #[test]
    fn test_empty_config() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config.server, RenderServerConfig::default());
        assert!(config.fixtures.is_empty());
    }
}
