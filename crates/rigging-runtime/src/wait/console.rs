//! Wait for a line on stdout matching a pattern.
//!
//! Processes can emit non-UTF8 bytes, so lines are read as bytes and
//! decoded lossily before matching.

use async_trait::async_trait;
use regex::Regex;
use rigging_core::{ApplicationError, Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{WaitStrategy, exited_early};
use crate::process::Handle;

/// Ready once any stdout line matches the pattern.
#[derive(Debug, Clone)]
pub struct ConsoleWaitStrategy {
    pattern: Regex,
}

impl ConsoleWaitStrategy {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("invalid pattern {pattern:?}: {e}")))?;
        Ok(Self { pattern })
    }

    pub const fn from_regex(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

#[async_trait]
impl WaitStrategy for ConsoleWaitStrategy {
    async fn wait_for(&self, handle: &dyn Handle, cancel: &CancellationToken) -> Result<()> {
        let output = handle.console()?.output()?.with_cancellation(cancel.clone());
        let mut reader = BufReader::new(output);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| match Error::from(e) {
                    Error::Interrupted => Error::Interrupted,
                    other => ApplicationError::with_cause("failed to start successfully", other)
                        .into(),
                })?;
            if n == 0 {
                debug!(pattern = %self.pattern, "Console ended before a match");
                return Err(if handle.is_running() {
                    Error::application("console output ended before the application was ready")
                } else {
                    exited_early(handle)
                });
            }

            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let line = String::from_utf8_lossy(&buf);
            if self.pattern.is_match(&line) {
                debug!(pattern = %self.pattern, line = %line, "Console matched");
                return Ok(());
            }
            trace!(line = %line, "Console line did not match");

            if !handle.is_running() {
                return Err(exited_early(handle));
            }
        }
    }
}
