//! Copies one process stream to a file and fans it out to any number of
//! late-joining readers.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::reader::{PersistentReader, ReadLimit};

/// Chunk size for the copy loop.
pub const BUFFER_SIZE: usize = 4096;

#[derive(Default)]
struct Shared {
    total_size: u64,
    end_of_file: bool,
    connected: Vec<Weak<ReadLimit>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the capture file for one stream.
///
/// Every reader from [`StreamMultiplexer::connect`] replays the stream from
/// byte zero and sees exactly the bytes written before end-of-source, no
/// matter when it connected.
pub struct StreamMultiplexer {
    path: PathBuf,
    shared: Arc<Mutex<Shared>>,
    progress: watch::Receiver<u64>,
}

impl StreamMultiplexer {
    /// Truncate `path` and start copying `source` into it on a background
    /// task. Must be called from within a tokio runtime.
    pub fn spawn<R>(source: R, path: impl Into<PathBuf>) -> io::Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let path = path.into();
        let output = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let (progress_tx, progress) = watch::channel(0);
        let shared = Arc::new(Mutex::new(Shared::default()));

        let task = CopyTask {
            source,
            output: File::from_std(output),
            path: path.clone(),
            shared: Arc::clone(&shared),
            progress: progress_tx,
        };
        tokio::spawn(task.run());

        Ok(Self {
            path,
            shared,
            progress,
        })
    }

    /// A stream that has already ended with nothing written, used when a
    /// process has no separate stream to capture.
    pub fn finished(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let (_, progress) = watch::channel(0);
        let shared = Shared {
            end_of_file: true,
            ..Shared::default()
        };

        Ok(Self {
            path,
            shared: Arc::new(Mutex::new(shared)),
            progress,
        })
    }

    /// Open a new reader positioned at the start of the capture.
    ///
    /// If the source has already ended the reader is bounded right away,
    /// otherwise it is bounded when the copy task finishes.
    pub fn connect(&self) -> io::Result<PersistentReader> {
        let mut shared = lock(&self.shared);
        let file = File::from_std(std::fs::File::open(&self.path)?);
        let limit = Arc::new(ReadLimit::new());

        if shared.end_of_file {
            limit.set(shared.total_size);
        } else {
            shared.connected.retain(|reader| reader.strong_count() > 0);
            shared.connected.push(Arc::downgrade(&limit));
        }

        Ok(PersistentReader::connected(file, limit, self.progress.clone()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes copied so far.
    pub fn total_size(&self) -> u64 {
        lock(&self.shared).total_size
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.shared).end_of_file
    }
}

struct CopyTask<R> {
    source: R,
    output: File,
    path: PathBuf,
    shared: Arc<Mutex<Shared>>,
    progress: watch::Sender<u64>,
}

impl<R> CopyTask<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn run(mut self) {
        let mut buf = vec![0u8; BUFFER_SIZE];
        if let Err(e) = self.copy(&mut buf).await {
            // A process closing its pipe mid-write is normal shutdown.
            trace!(path = %self.path.display(), error = %e, "Stream copy ended with error");
        }
        self.finish();
    }

    async fn copy(&mut self, buf: &mut [u8]) -> io::Result<()> {
        loop {
            let n = self.source.read(buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.output.write_all(&buf[..n]).await?;
            self.output.flush().await?;

            let total = {
                let mut shared = lock(&self.shared);
                shared.total_size += n as u64;
                shared.total_size
            };
            self.progress.send_replace(total);
        }
    }

    /// Bound every connected reader, then drop the progress sender so
    /// sleeping readers wake up and observe their limit.
    fn finish(self) {
        let total = {
            let mut shared = lock(&self.shared);
            shared.end_of_file = true;
            let total = shared.total_size;
            for reader in shared.connected.drain(..) {
                if let Some(limit) = reader.upgrade() {
                    limit.set(total);
                }
            }
            total
        };
        debug!(path = %self.path.display(), bytes = total, "Stream capture finished");
    }
}
