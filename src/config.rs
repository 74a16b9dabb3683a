//! Configuration loader and validator for the Confluence publisher.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub confluence: Confluence,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub attachment_dir: String,
    pub poll_interval_seconds: u64,
}

/// Confluence connection settings and provider selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confluence {
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub api_token: String,
    pub default_space: String,
    /// Provider token resolved by [`crate::provider::select_provider`].
    /// Unknown or empty values fall back to the stub provider.
    #[serde(default)]
    pub provider: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` and
    /// `app.attachment_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        for dir in [&self.app.data_dir, &self.app.attachment_dir] {
            if !dir.trim().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.attachment_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.attachment_dir must be non-empty"));
    }
    if cfg.app.poll_interval_seconds == 0 {
        return Err(ConfigError::Invalid(
            "app.poll_interval_seconds must be > 0",
        ));
    }

    if cfg.confluence.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("confluence.base_url must be non-empty"));
    }
    if cfg.confluence.default_space.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "confluence.default_space must be non-empty",
        ));
    }
    // username/api_token may be empty: the live provider degrades to Basic
    // auth with an empty password, and the stub needs neither.

    Ok(())
}

/// Example YAML configuration, also exercised by the config tests.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  attachment_dir: "./storage/attachments"
  poll_interval_seconds: 5

confluence:
  base_url: "https://your-domain.atlassian.net"
  username: "publisher@example.com"
  api_token: "YOUR_CONFLUENCE_API_TOKEN"
  default_space: "DEV"
  provider: "confluence-stub"
"#
}
