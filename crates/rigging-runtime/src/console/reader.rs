//! Reader over a file that is still being appended to.
//!
//! A plain file reader reports end-of-data as soon as it catches up with
//! the writer. [`PersistentReader`] instead suspends until more bytes land
//! or until a final length is announced through [`PersistentReader::end_of_file`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Read limit of a reader nobody has bounded yet.
pub const UNBOUNDED: u64 = u64::MAX;

/// Shared, shrink-only byte limit for one reader.
#[derive(Debug)]
pub(crate) struct ReadLimit(AtomicU64);

impl ReadLimit {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(UNBOUNDED))
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Lowers the limit to `total`. A limit never grows back.
    pub(crate) fn set(&self, total: u64) {
        self.0.fetch_min(total, Ordering::AcqRel);
    }
}

struct Cancellation {
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

/// Async reader that blocks past the current end of a growing file.
///
/// Readers handed out by a [`super::StreamMultiplexer`] sleep until the
/// writer reports progress. A reader built directly with
/// [`PersistentReader::new`] has no progress feed and falls back to
/// yielding to the scheduler and retrying.
pub struct PersistentReader {
    file: Option<File>,
    limit: Arc<ReadLimit>,
    total_read: u64,
    progress: Option<WatchStream<u64>>,
    writer_gone: bool,
    cancellation: Option<Cancellation>,
}

impl PersistentReader {
    /// Wrap `file`; reads block until [`Self::end_of_file`] bounds them.
    pub fn new(file: File) -> Self {
        Self {
            file: Some(file),
            limit: Arc::new(ReadLimit::new()),
            total_read: 0,
            progress: None,
            writer_gone: false,
            cancellation: None,
        }
    }

    pub(crate) fn connected(
        file: File,
        limit: Arc<ReadLimit>,
        progress: watch::Receiver<u64>,
    ) -> Self {
        Self {
            file: Some(file),
            limit,
            total_read: 0,
            progress: Some(WatchStream::new(progress)),
            writer_gone: false,
            cancellation: None,
        }
    }

    /// Fail pending and future reads with `ErrorKind::Interrupted` once
    /// `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        self.cancellation = Some(Cancellation { token, cancelled });
        self
    }

    /// Announce the total number of bytes that will ever be readable.
    /// `0` stops the reader immediately.
    pub fn end_of_file(&self, total: u64) {
        self.limit.set(total);
    }

    /// Bytes returned to the caller so far.
    pub const fn total_read(&self) -> u64 {
        self.total_read
    }

    /// Current limit, [`UNBOUNDED`] until announced.
    pub fn read_limit(&self) -> u64 {
        self.limit.get()
    }

    pub const fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Stop reading and release the file handle. Later reads fail with a
    /// "stream closed" error rather than reporting end-of-data.
    pub fn close(&mut self) {
        self.end_of_file(0);
        self.file = None;
        self.progress = None;
    }

    fn poll_cancelled(&mut self, cx: &mut Context<'_>) -> bool {
        match self.cancellation.as_mut() {
            Some(c) => c.token.is_cancelled() || c.cancelled.as_mut().poll(cx).is_ready(),
            None => false,
        }
    }
}

impl AsyncRead for PersistentReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            let Some(file) = this.file.as_mut() else {
                return Poll::Ready(Err(io::Error::other("stream closed")));
            };

            let allowed = this.limit.get().saturating_sub(this.total_read);
            if allowed == 0 || buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }

            // Never hand out bytes past the announced limit.
            let max = usize::try_from(allowed).map_or(buf.remaining(), |a| a.min(buf.remaining()));
            let dst = buf.initialize_unfilled_to(max);
            let mut chunk = ReadBuf::new(dst);
            ready!(Pin::new(file).poll_read(cx, &mut chunk))?;
            let n = chunk.filled().len();

            if n > 0 {
                buf.advance(n);
                this.total_read += n as u64;
                return Poll::Ready(Ok(()));
            }

            // Caught up with the writer.
            if this.total_read >= this.limit.get() || this.writer_gone {
                return Poll::Ready(Ok(()));
            }

            if this.poll_cancelled(cx) {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "read cancelled",
                )));
            }

            match this.progress.as_mut() {
                Some(progress) => match Pin::new(progress).poll_next(cx) {
                    Poll::Ready(Some(_)) => {}
                    // Writer finished; the limit was announced before it left.
                    Poll::Ready(None) => this.writer_gone = true,
                    Poll::Pending => return Poll::Pending,
                },
                None => {
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
            }
        }
    }
}
