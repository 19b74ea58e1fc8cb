//! Configuration file (`wlbridge.toml`)
//!
//! Every field has a default, so an empty or missing file is valid.
//! Environment variables win over the file (see `logging::LogConfig::apply_env`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{parse_level, LogConfig, LogFormat, LogOutput};

pub const CONFIG_FILE: &str = "wlbridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cli: CliConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: FormatSetting,

    /// Rolling log files go here instead of stderr
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_false")]
    pub span_events: bool,

    /// Extra `EnvFilter` directives
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatSetting {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Machine-readable output for every command
    #[serde(default = "default_false")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: FormatSetting::default(),
            directory: None,
            file_prefix: default_prefix(),
            span_events: false,
            filter: None,
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_prefix() -> String { "wlbridge".to_string() }
fn default_false() -> bool { false }

impl From<FormatSetting> for LogFormat {
    fn from(setting: FormatSetting) -> Self {
        match setting {
            FormatSetting::Pretty => LogFormat::Pretty,
            FormatSetting::Compact => LogFormat::Compact,
            FormatSetting::Json => LogFormat::Json,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if parse_level(&self.logging.level).is_none() {
            return Err(format!("Unknown log level '{}'", self.logging.level));
        }
        Ok(())
    }

    /// Nearest `wlbridge.toml` in `start` or one of its parents
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.is_file())
    }

    /// Load the nearest configuration file above `start`, or defaults
    pub fn discover_from(start: &Path) -> Self {
        match Self::find(start) {
            Some(path) => match Self::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        std::env::current_dir()
            .map(|dir| Self::discover_from(&dir))
            .unwrap_or_default()
    }

    /// Logging settings from the file, with environment overrides applied
    pub fn log_config(&self) -> LogConfig {
        let logging = &self.logging;
        let mut config = LogConfig::new()
            .with_format(logging.format.into())
            .with_span_events(logging.span_events);

        if let Some(level) = parse_level(&logging.level) {
            config = config.with_level(level);
        }
        if let Some(directory) = &logging.directory {
            config = config.with_output(LogOutput::File {
                directory: directory.clone(),
                prefix: logging.file_prefix.clone(),
            });
        }
        if let Some(filter) = &logging.filter {
            config = config.with_filter(filter.clone());
        }

        config.apply_env()
    }
}
