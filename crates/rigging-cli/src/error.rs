//! CLI-specific error types and exit code mapping.

use rigging_core::Error as CoreError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Orchestration or process failure.
    #[error("{0}")]
    Core(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No port in the requested range could be leased.
    #[error("{0}")]
    Unavailable(String),

    /// Interrupted by the user.
    #[error("interrupted")]
    Interrupted,
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Specific error categories (see sysexits.h)
    /// - 130: Terminated by Ctrl-C
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2,
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
            Self::Interrupted => 130,
        }
    }
}

impl From<&CoreError> for CliError {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::Interrupted => Self::Interrupted,
            CoreError::InvalidArgument(msg) => Self::Arguments(msg.clone()),
            CoreError::PortsExhausted { .. } => Self::Unavailable(err.to_string()),
            CoreError::Lease { .. } | CoreError::Io(_) => Self::Io(err.to_string()),
            CoreError::Path(_) => Self::Config(err.to_string()),
            CoreError::Application(_) | CoreError::IllegalState(_) => Self::Core(err.to_string()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error returned from a handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(core) = err.downcast_ref::<CoreError>() {
        return CliError::from(core).exit_code();
    }
    1
}
