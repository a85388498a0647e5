//! Writer that feeds a process's stdin and records every byte.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

struct Tee {
    process: Sink,
    log: File,
}

/// Tee over the real stdin and its log file.
///
/// Each operation is attempted on both sides even when the first one
/// fails. When both fail, the returned error names both failures.
pub struct ConsoleInput {
    path: PathBuf,
    inner: Mutex<Option<Tee>>,
}

impl ConsoleInput {
    pub(crate) fn new(process: Sink, log: File, path: PathBuf) -> Self {
        Self {
            path,
            inner: Mutex::new(Some(Tee { process, log })),
        }
    }

    /// Log file holding everything written so far.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock().await;
        let tee = guard.as_mut().ok_or_else(closed)?;
        let process = tee.process.write_all(bytes).await;
        let log = tee.log.write_all(bytes).await;
        combine(process, log)
    }

    pub async fn flush(&self) -> io::Result<()> {
        let mut guard = self.inner.lock().await;
        let tee = guard.as_mut().ok_or_else(closed)?;
        let process = tee.process.flush().await;
        let log = tee.log.flush().await;
        combine(process, log)
    }

    /// Close both sides. Closing twice is a no-op.
    pub async fn close(&self) -> io::Result<()> {
        let Some(mut tee) = self.inner.lock().await.take() else {
            return Ok(());
        };
        let process = tee.process.shutdown().await;
        let log = tee.log.shutdown().await;
        debug!(path = %self.path.display(), "Console input closed");
        combine(process, log)
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream closed")
}

fn combine(process: io::Result<()>, log: io::Result<()>) -> io::Result<()> {
    match (process, log) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(first), Err(second)) => Err(io::Error::new(
            first.kind(),
            format!("{first} (log: {second})"),
        )),
    }
}
