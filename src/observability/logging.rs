//! tracing subscriber setup

use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{ConsoleError, ConsoleResult};

/// Environment variable overriding the configured filter
pub const LOG_ENV_VAR: &str = "DSCONSOLE_LOG";

/// Install the global subscriber. Logs go to stderr so that stdout stays
/// reserved for command responses. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) -> ConsoleResult<()> {
    let level = parse_log_level(&config.level)?;
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(&config.level));

    // layer types differ, so each branch initialises separately
    let installed = if config.json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);
        Registry::default().with(filter).with(layer).try_init()
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);
        Registry::default().with(filter).with(layer).try_init()
    };

    if installed.is_ok() {
        info!("Logging initialized with level: {}", level);
    }
    Ok(())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> ConsoleResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConsoleError::validation(format!(
            "invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ))),
    }
}
