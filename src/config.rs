//! Console configuration
//!
//! Loaded from a JSON file. Every field has a default so an empty object
//! is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};
use crate::observability::parse_log_level;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level console configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Server instance identity, compared when admitting tasks
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Configuration file edited while the server is stopped
    #[serde(default = "default_server_config_file")]
    pub server_config_file: PathBuf,

    /// Optional JSON schema snapshot
    #[serde(default)]
    pub schema_file: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_instance() -> String {
    "localhost".to_string()
}
fn default_server_config_file() -> PathBuf {
    PathBuf::from("config/config.json")
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            server_config_file: default_server_config_file(),
            schema_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConsoleError::local(format!(
                "failed to read console config {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: ConsoleConfig = serde_json::from_str(&content)
            .map_err(|e| ConsoleError::local(format!("invalid console config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> ConsoleResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.instance.trim().is_empty() {
            return Err(ConsoleError::validation("instance must not be empty"));
        }
        parse_log_level(&self.logging.level)?;
        Ok(())
    }
}
