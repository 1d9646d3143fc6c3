//! Configuration loader and validator for the batch translation runner.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
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
    pub providers: Providers,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Root for staging and translated-document output.
    pub data_dir: String,
    /// TTL of the per-token claim preventing concurrent runs.
    pub lease_ttl_seconds: u64,
}

/// Credentials and poll bounds for each vendor backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Providers {
    pub google: ProviderSettings,
    pub azure: ProviderSettings,
    pub aws: ProviderSettings,
}

/// Per-vendor connection settings. The poll bounds cap how long a remote
/// document-translation job may be waited on before it counts as timed out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default)]
    pub region: Option<String>,
    pub max_poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl ProviderSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
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
    if cfg.app.lease_ttl_seconds == 0 {
        return Err(ConfigError::Invalid("app.lease_ttl_seconds must be > 0"));
    }

    validate_provider(&cfg.providers.google, "google")?;
    validate_provider(&cfg.providers.azure, "azure")?;
    validate_provider(&cfg.providers.aws, "aws")?;

    Ok(())
}

fn validate_provider(p: &ProviderSettings, name: &'static str) -> Result<(), ConfigError> {
    if p.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(match name {
            "google" => "providers.google.endpoint must be non-empty",
            "azure" => "providers.azure.endpoint must be non-empty",
            _ => "providers.aws.endpoint must be non-empty",
        }));
    }
    if p.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid(match name {
            "google" => "providers.google.api_key must be non-empty",
            "azure" => "providers.azure.api_key must be non-empty",
            _ => "providers.aws.api_key must be non-empty",
        }));
    }
    if p.max_poll_attempts == 0 {
        return Err(ConfigError::Invalid("max_poll_attempts must be > 0"));
    }
    if p.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("poll_interval_ms must be > 0"));
    }
    Ok(())
}

/// Example YAML used by tests and `--help` documentation.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  lease_ttl_seconds: 600

providers:
  google:
    endpoint: "https://translation.googleapis.com/"
    api_key: "YOUR_GOOGLE_API_KEY"
    max_poll_attempts: 30
    poll_interval_ms: 2000
  azure:
    endpoint: "https://api.cognitive.microsofttranslator.com/"
    api_key: "YOUR_AZURE_SUBSCRIPTION_KEY"
    region: "eastus"
    max_poll_attempts: 60
    poll_interval_ms: 10000
  aws:
    endpoint: "https://translate.us-east-1.amazonaws.com/"
    api_key: "YOUR_AWS_ACCESS_TOKEN"
    region: "us-east-1"
    max_poll_attempts: 60
    poll_interval_ms: 5000
"#
}
