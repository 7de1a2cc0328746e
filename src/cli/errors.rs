//! CLI-specific error types
//!
//! Every CLI error is fatal: the binary reports it and exits non-zero.

use std::fmt;
use std::io;

use crate::population::PopulationError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Malformed `--index` or `--unique` argument
    InvalidIndexSpec,
    /// Entity file is not a JSON array of entities
    InvalidEntities,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::InvalidIndexSpec => "AERO_CLI_INVALID_INDEX_SPEC",
            Self::InvalidEntities => "AERO_CLI_INVALID_ENTITIES",
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
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_index_spec(spec: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::InvalidIndexSpec,
            format!("invalid index '{}': {}", spec, reason),
        )
    }

    pub fn invalid_entities(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidEntities, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
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

impl From<PopulationError> for CliError {
    fn from(e: PopulationError) -> Self {
        Self::config_error(format!("{}: {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
