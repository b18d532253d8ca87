//! Configuration file parsing and structures.
//!
//! wizd uses TOML for declarative configuration. Each integration owns a
//! statically typed section under `[integrations]`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::integrations::wiz::WizConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP API; disabled when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"wizd::integrations::wiz" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: `level` by default, `overrides` per target.
    pub fn filter(&self) -> Targets {
        Targets::new()
            .with_default(LevelFilter::from(self.level))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationsConfig {
    /// WiZ network bulbs
    #[serde(default)]
    pub wiz_light: Option<WizConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints serde cannot express. All problems are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if let Some(wiz) = &self.integrations.wiz_light {
            problems.extend(wiz.validate("integrations.wiz_light"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration:\n  {}", .0.join("\n  "))]
    Validation(Vec<String>),
}
