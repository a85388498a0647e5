//! Error taxonomy shared by every rigging crate.
//!
//! Orchestration failures are reported as [`ApplicationError`], which carries
//! an optional primary cause and an ordered list of suppressed failures so a
//! single report can describe every unit that misbehaved. Interruption is a
//! separate variant and is never folded into an [`ApplicationError`].

use std::fmt;
use std::io;

use thiserror::Error;

use crate::paths::PathError;

/// Convenience alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by units, consoles, leases and the group orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// Domain orchestration failure, possibly aggregating several causes.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// A blocking wait observed a cancellation request.
    #[error("interrupted")]
    Interrupted,

    /// An operation was called before its precondition held.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A constructor or helper received an out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every port in the scanned range was rejected.
    #[error("no ports between {lower} and {upper} are available")]
    PortsExhausted { lower: u16, upper: u16 },

    /// The lease directory or its lock file could not be used.
    #[error("error acquiring lease for port {port}")]
    Lease {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Directory resolution or creation failed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Raw I/O failure on a console or process handle.
    #[error(transparent)]
    Io(io::Error),
}

impl Error {
    /// Returns `true` for [`Error::Interrupted`].
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Shorthand for an [`Error::Application`] carrying only a message.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application(ApplicationError::new(message))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::Io(err)
        }
    }
}

/// Domain error for start/stop failures.
///
/// The primary cause is exposed through [`std::error::Error::source`], so
/// standard cause-chain walking reaches the first real failure. Every later
/// failure is kept, in the order it occurred, in [`Self::suppressed`].
#[derive(Debug)]
pub struct ApplicationError {
    message: String,
    cause: Option<Box<Error>>,
    suppressed: Vec<Error>,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            suppressed: Vec::new(),
        }
    }

    /// Wraps `cause`, reusing its message.
    pub fn caused_by(cause: Error) -> Self {
        Self {
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
            suppressed: Vec::new(),
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: Error) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
            suppressed: Vec::new(),
        }
    }

    /// Attaches a secondary failure. Order of calls is preserved.
    pub fn add_suppressed(&mut self, error: Error) {
        self.suppressed.push(error);
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    pub fn suppressed(&self) -> &[Error] {
        &self.suppressed
    }

    /// Follows nested application errors down to the innermost cause.
    pub fn root_cause(&self) -> Option<&Error> {
        let mut current = self.cause.as_deref()?;
        while let Error::Application(inner) = current {
            match inner.cause.as_deref() {
                Some(next) => current = next,
                None => break,
            }
        }
        Some(current)
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.suppressed.is_empty() {
            write!(f, " (+{} suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
