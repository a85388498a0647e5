//! Platform seam for a launched process.

use std::sync::Arc;

use async_trait::async_trait;
use rigging_core::Result;

use crate::console::FileConsole;

/// Controls one process: where it runs and how it is signalled is up to
/// the implementation.
#[async_trait]
pub trait Handle: Send + Sync {
    /// Launch the process. A handle that is already started is left alone.
    async fn start(&self) -> Result<()>;

    /// Ask the process to stop and close its stdin. Does not wait for exit.
    async fn stop(&self) -> Result<()>;

    /// Wait until the process exits.
    async fn wait(&self) -> Result<()>;

    /// Exit code of the last run. Fails if never started or still running.
    fn exit_code(&self) -> Result<i32>;

    /// The last run has been launched and has not exited yet.
    fn is_running(&self) -> bool;

    /// Started and not stopped since.
    fn is_started(&self) -> bool;

    /// Console of the last run. Fails before the first start or when stdio
    /// is inherited.
    fn console(&self) -> Result<Arc<FileConsole>>;
}
