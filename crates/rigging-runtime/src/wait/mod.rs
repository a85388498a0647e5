//! Strategies deciding when a started process is ready.

mod console;
mod healthy;

use async_trait::async_trait;
use rigging_core::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::process::Handle;

pub use console::ConsoleWaitStrategy;
pub use healthy::{DEFAULT_POLL_INTERVAL, HealthCheck, TcpPortHealthCheck, UntilHealthyWaitStrategy};

/// Blocks until a process is ready to serve.
///
/// Implementations return [`Error::Interrupted`] once `cancel` fires and an
/// application error when the process dies before becoming ready.
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    async fn wait_for(&self, handle: &dyn Handle, cancel: &CancellationToken) -> Result<()>;
}

/// Treats a process as ready as soon as it has been launched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpWaitStrategy;

#[async_trait]
impl WaitStrategy for NoOpWaitStrategy {
    async fn wait_for(&self, _handle: &dyn Handle, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// Error for a process that died while being waited on.
pub(crate) fn exited_early(handle: &dyn Handle) -> Error {
    match handle.exit_code() {
        Ok(code) => Error::application(format!("application has exited with code {code}")),
        Err(_) => Error::application("application has exited"),
    }
}
