//! CLI-specific error types
//!
//! Console errors keep their own code; failures of the CLI's own I/O use
//! `DSC_CLI_IO`.

use std::fmt;
use std::io;

use crate::error::ConsoleError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Reading arguments or writing output failed
    IoError,
    /// A console operation failed
    Console(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::IoError => "DSC_CLI_IO",
            Self::Console(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<ConsoleError> for CliError {
    fn from(e: ConsoleError) -> Self {
        Self::new(CliErrorCode::Console(e.code()), e.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_error_keeps_code() {
        let err = CliError::from(ConsoleError::permission("system index"));
        assert_eq!(err.code_str(), "DSC_PERMISSION");
        assert!(err.message().contains("system index"));
    }

    #[test]
    fn test_io_error_code() {
        let err = CliError::from(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(err.code_str(), "DSC_CLI_IO");
        assert_eq!(err.to_string(), "DSC_CLI_IO: closed");
    }
}
