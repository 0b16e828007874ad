//! Error taxonomy for dsconsole
//!
//! Error codes:
//! - DSC_VALIDATION (malformed input, caught before any commit)
//! - DSC_PERMISSION (non-configurable element)
//! - DSC_INCOMPATIBLE (task admission refused)
//! - DSC_CONFIG_REMOTE / DSC_CONFIG_LOCAL (store commit failures)
//! - DSC_INTERNAL (programming faults)

use thiserror::Error;

/// Crate-wide result type
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Malformed input. Always fixable by correcting the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Attempt to change something the server does not let users configure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PermissionError {
    message: String,
}

impl PermissionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A task could not be admitted because a running task conflicts with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{candidate}' cannot be launched while '{running}' is running on backend(s) {}", .backends.join(", "))]
pub struct IncompatibilityError {
    /// Description of the task already running
    pub running: String,
    /// Description of the task that was refused
    pub candidate: String,
    /// Backends both tasks touch
    pub backends: Vec<String>,
}

/// Failure raised by a configuration store while reading or committing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The running server refused or failed the change
    #[error("server configuration error: {0}")]
    Remote(String),

    /// The offline configuration file could not be read or written
    #[error("local configuration error: {0}")]
    Local(String),
}

/// Unified console error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("permission denied: {0}")]
    Permission(#[from] PermissionError),

    #[error("incompatible task: {0}")]
    Incompatible(#[from] IncompatibilityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(msg))
    }

    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(PermissionError::new(msg))
    }

    /// Create a remote configuration error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Remote(msg.into()))
    }

    /// Create a local configuration error
    pub fn local(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Local(msg.into()))
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code for responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "DSC_VALIDATION",
            Self::Permission(_) => "DSC_PERMISSION",
            Self::Incompatible(_) => "DSC_INCOMPATIBLE",
            Self::Config(ConfigError::Remote(_)) => "DSC_CONFIG_REMOTE",
            Self::Config(ConfigError::Local(_)) => "DSC_CONFIG_LOCAL",
            Self::Internal(_) => "DSC_INTERNAL",
        }
    }

    /// True when resubmitting with corrected input can succeed
    pub fn is_retryable_by_input(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }

    pub fn is_incompatible(&self) -> bool {
        matches!(self, Self::Incompatible(_))
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        Self::local(format!("JSON error: {}", e))
    }
}
