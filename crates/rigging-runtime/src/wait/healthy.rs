//! Poll a health check until it passes.

use std::time::Duration;

use async_trait::async_trait;
use rigging_core::{ApplicationError, Error, Result};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{WaitStrategy, exited_early};
use crate::process::Handle;

/// Pause between failed health checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single readiness probe.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// `Ok(false)` means "not yet"; an error aborts the wait.
    async fn is_healthy(&self, handle: &dyn Handle) -> Result<bool>;
}

/// Healthy once a TCP connection to `host:port` is accepted.
#[derive(Debug, Clone)]
pub struct TcpPortHealthCheck {
    host: String,
    port: u16,
}

impl TcpPortHealthCheck {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }
}

#[async_trait]
impl HealthCheck for TcpPortHealthCheck {
    async fn is_healthy(&self, _handle: &dyn Handle) -> Result<bool> {
        match TcpStream::connect((self.host.as_str(), self.port)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => Ok(false),
            Err(e) => Err(ApplicationError::with_cause(
                format!("health check on {}:{} failed", self.host, self.port),
                e.into(),
            )
            .into()),
        }
    }
}

/// Polls a [`HealthCheck`] until it passes, the process dies, or the wait
/// is cancelled.
#[derive(Debug, Clone)]
pub struct UntilHealthyWaitStrategy<H> {
    check: H,
    interval: Duration,
}

impl<H: HealthCheck> UntilHealthyWaitStrategy<H> {
    pub const fn new(check: H) -> Self {
        Self {
            check,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl<H: HealthCheck> WaitStrategy for UntilHealthyWaitStrategy<H> {
    async fn wait_for(&self, handle: &dyn Handle, cancel: &CancellationToken) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if self.check.is_healthy(handle).await? {
                debug!(attempt, "Health check passed");
                return Ok(());
            }
            if !handle.is_running() {
                return Err(exited_early(handle));
            }
            trace!(attempt, "Health check not yet passing");

            tokio::select! {
                () = sleep(self.interval) => {}
                () = cancel.cancelled() => return Err(Error::Interrupted),
            }
        }
    }
}
