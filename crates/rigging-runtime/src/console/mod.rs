//! File-backed console capture for a launched process.
//!
//! Each of stdin, stdout and stderr is mirrored into its own file under the
//! console directory. Output streams can be read any number of times, from
//! the beginning, while the process is still writing.

mod input;
mod multiplexer;
mod reader;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rigging_core::{Error, Result, RiggingConfig};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tracing::debug;

pub use input::ConsoleInput;
pub use multiplexer::{BUFFER_SIZE, StreamMultiplexer};
pub use reader::{PersistentReader, UNBOUNDED};

/// One capture file. The file is removed on drop unless it was kept.
struct Capture {
    path: PathBuf,
    _cleanup: Option<TempPath>,
}

impl Capture {
    fn create(dir: &Path, suffix: &str, keep: bool) -> io::Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("console-")
            .suffix(suffix)
            .tempfile_in(dir)?
            .into_temp_path();

        if keep {
            let path = temp.keep().map_err(|e| e.error)?;
            Ok(Self {
                path,
                _cleanup: None,
            })
        } else {
            Ok(Self {
                path: temp.to_path_buf(),
                _cleanup: Some(temp),
            })
        }
    }
}

/// Console of a running process.
pub struct FileConsole {
    input: Arc<ConsoleInput>,
    output: StreamMultiplexer,
    error: StreamMultiplexer,
    // Dropped last so the files outlive the streams writing to them.
    _files: [Capture; 3],
}

impl FileConsole {
    /// Capture `stdout` and `stderr` and tee `stdin`.
    ///
    /// With `stderr` set to `None` the error stream is an empty, already
    /// finished capture; use this when stderr is merged into stdout.
    pub fn new<W, O, E>(
        stdin: W,
        stdout: O,
        stderr: Option<E>,
        config: &RiggingConfig,
    ) -> Result<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let dir = config.ensure_console_dir()?;
        let keep = config.keep_console_files;

        let input_file = Capture::create(&dir, ".stdin", keep)?;
        let output_file = Capture::create(&dir, ".stdout", keep)?;
        let error_file = Capture::create(&dir, ".stderr", keep)?;

        let log = File::from_std(std::fs::File::create(&input_file.path)?);
        let input = Arc::new(ConsoleInput::new(
            Box::new(stdin),
            log,
            input_file.path.clone(),
        ));

        let output = StreamMultiplexer::spawn(stdout, output_file.path.clone())?;
        let error = match stderr {
            Some(stderr) => StreamMultiplexer::spawn(stderr, error_file.path.clone())?,
            None => StreamMultiplexer::finished(error_file.path.clone())?,
        };

        debug!(
            stdout = %output_file.path.display(),
            stderr = %error_file.path.display(),
            "Console capture started"
        );

        Ok(Self {
            input,
            output,
            error,
            _files: [input_file, output_file, error_file],
        })
    }

    /// Take stdio from a spawned child. Stdin and stdout must be piped;
    /// stderr is captured when piped and treated as merged otherwise.
    pub fn from_child(child: &mut Child, config: &RiggingConfig) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::IllegalState("child stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::IllegalState("child stdout is not piped".to_string()))?;
        Self::new(stdin, stdout, child.stderr.take(), config)
    }

    /// The process's stdin. Every call returns the same writer.
    pub fn input(&self) -> Arc<ConsoleInput> {
        Arc::clone(&self.input)
    }

    /// A new reader over stdout, starting at the first byte.
    pub fn output(&self) -> io::Result<PersistentReader> {
        self.output.connect()
    }

    /// A new reader over stderr, starting at the first byte.
    pub fn error(&self) -> io::Result<PersistentReader> {
        self.error.connect()
    }

    pub fn input_file(&self) -> &Path {
        self.input.path()
    }

    pub fn output_file(&self) -> &Path {
        self.output.path()
    }

    pub fn error_file(&self) -> &Path {
        self.error.path()
    }

    /// Close stdin. Readers already handed out stay usable.
    pub async fn close(&self) -> io::Result<()> {
        self.input.close().await
    }
}

impl std::fmt::Debug for FileConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConsole")
            .field("input", &self.input_file())
            .field("output", &self.output_file())
            .field("error", &self.error_file())
            .finish_non_exhaustive()
    }
}
