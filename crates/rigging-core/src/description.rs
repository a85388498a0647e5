//! Immutable description of a process to launch.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What to run and how to wire its stdio.
///
/// This is pure configuration; a process handle consumes it at start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Executable followed by its arguments.
    pub command: Vec<String>,
    /// Variables added to (or overriding) the inherited environment.
    pub environment: BTreeMap<String, String>,
    /// Working directory of the process.
    pub working_directory: PathBuf,
    /// Send stderr into the stdout capture.
    pub error_to_output: bool,
    /// Inherit the parent's stdio instead of capturing it.
    pub inherit_io: bool,
}

impl Description {
    /// Describe `executable` run with no arguments from the current directory.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            command: vec![executable.into()],
            environment: BTreeMap::new(),
            working_directory: PathBuf::from("."),
            error_to_output: false,
            inherit_io: false,
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.command.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    #[must_use]
    pub const fn with_error_to_output(mut self, merged: bool) -> Self {
        self.error_to_output = merged;
        self
    }

    #[must_use]
    pub const fn with_inherit_io(mut self, inherit: bool) -> Self {
        self.inherit_io = inherit;
        self
    }

    pub fn executable(&self) -> &str {
        self.command.first().map_or("", String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

impl fmt::Display for Description {
    /// Renders the command the way a shell user would type it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.command.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if part.is_empty() || part.contains(char::is_whitespace) || part.contains('\'') {
                write!(f, "'{}'", part.replace('\'', r"'\''"))?;
            } else {
                f.write_str(part)?;
            }
        }
        Ok(())
    }
}
