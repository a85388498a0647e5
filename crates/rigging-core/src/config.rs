//! Runtime configuration passed explicitly into consoles and lease registries.
//!
//! Nothing in rigging reads a process-wide singleton for its directories;
//! tests build a config over an isolated temp dir, binaries call
//! [`RiggingConfig::from_env`].

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::{self, PathError, ensure_dir};

/// Environment variable that keeps console backing files after use.
pub const KEEP_CONSOLE_FILES_ENV: &str = "RIGGING_KEEP_CONSOLE_FILES";

/// Environment variable overriding the lease time-to-live, in seconds.
pub const LEASE_TTL_ENV: &str = "RIGGING_LEASE_TTL_SECS";

/// Default time a port lease stays valid.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the lease directory under the temp root.
pub const PORT_DIR_NAME: &str = "port";

/// Name of the console capture directory under the temp root.
pub const CONSOLE_DIR_NAME: &str = "console";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiggingConfig {
    /// Root for every file rigging creates.
    pub temp_dir: PathBuf,
    /// How long a freshly written port lease is valid.
    pub lease_ttl: Duration,
    /// Keep stdin/stdout/stderr capture files when a console is dropped.
    pub keep_console_files: bool,
}

impl RiggingConfig {
    /// Config rooted at `temp_dir` with default TTL and cleanup.
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            lease_ttl: DEFAULT_LEASE_TTL,
            keep_console_files: false,
        }
    }

    /// Build from `RIGGING_TEMP_DIR`, `RIGGING_KEEP_CONSOLE_FILES` and
    /// `RIGGING_LEASE_TTL_SECS`. Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new(paths::temp_root());

        if let Ok(value) = env::var(KEEP_CONSOLE_FILES_ENV) {
            config.keep_console_files = parse_flag(&value);
        }

        if let Ok(value) = env::var(LEASE_TTL_ENV)
            && let Ok(secs) = value.trim().parse::<u64>()
        {
            config.lease_ttl = Duration::from_secs(secs);
        }

        config
    }

    #[must_use]
    pub const fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_keep_console_files(mut self, keep: bool) -> Self {
        self.keep_console_files = keep;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Directory holding one lease file per port plus the shared lock file.
    pub fn port_dir(&self) -> PathBuf {
        self.temp_dir.join(PORT_DIR_NAME)
    }

    /// Directory holding console capture files.
    pub fn console_dir(&self) -> PathBuf {
        self.temp_dir.join(CONSOLE_DIR_NAME)
    }

    /// Create the port directory if needed and return it.
    pub fn ensure_port_dir(&self) -> Result<PathBuf, PathError> {
        let dir = self.port_dir();
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Create the console directory if needed and return it.
    pub fn ensure_console_dir(&self) -> Result<PathBuf, PathError> {
        let dir = self.console_dir();
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

impl Default for RiggingConfig {
    fn default() -> Self {
        Self::new(paths::default_temp_root())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
