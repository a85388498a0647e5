//! Processes spawned on this machine through `tokio::process`.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rigging_core::{ApplicationError, Description, Error, Result, RiggingConfig};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::Handle;
use super::shutdown::{DEFAULT_GRACE_PERIOD, exit_code, shutdown_child};
use crate::console::FileConsole;

/// One launch of the process.
struct Run {
    pid: Option<u32>,
    console: Option<Arc<FileConsole>>,
    stop: CancellationToken,
    exit: watch::Receiver<Option<i32>>,
}

#[derive(Default)]
struct State {
    started: bool,
    run: Option<Run>,
}

/// [`Handle`] over a child process of this one.
///
/// A background task owns the child and reaps it. Stopping sends SIGTERM
/// and escalates to SIGKILL after the grace period. Dropping a started
/// handle stops the process the same way.
///
/// [`Handle::is_running`] stays `true` after a stop request until the
/// process has actually been reaped, so a wait after stop really waits.
pub struct LocalHandle {
    description: Description,
    config: RiggingConfig,
    grace: Duration,
    state: Mutex<State>,
}

impl LocalHandle {
    pub fn new(description: Description, config: RiggingConfig) -> Self {
        Self {
            description,
            config,
            grace: DEFAULT_GRACE_PERIOD,
            state: Mutex::new(State::default()),
        }
    }

    /// Time between SIGTERM and SIGKILL on stop.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub const fn description(&self) -> &Description {
        &self.description
    }

    /// OS process id of the last run, while it is known.
    pub fn pid(&self) -> Option<u32> {
        self.lock().run.as_ref().and_then(|run| run.pid)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn never_started(&self) -> Error {
        Error::IllegalState(format!("{} was never started", self.description))
    }

    fn command(&self) -> Result<Command> {
        if self.description.executable().is_empty() {
            return Err(Error::InvalidArgument("command is empty".to_string()));
        }

        let mut command = Command::new(self.description.executable());
        command
            .args(self.description.args())
            .current_dir(self.description.working_directory())
            .envs(&self.description.environment)
            .kill_on_drop(true);

        if self.description.inherit_io {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        Ok(command)
    }

    fn spawn(&self) -> Result<Run> {
        let mut command = self.command()?;
        let merged = if self.description.error_to_output && !self.description.inherit_io {
            Some(merge_stderr(&mut command)?)
        } else {
            None
        };

        let mut child = command.spawn().map_err(|e| {
            ApplicationError::with_cause(format!("failed to start {}", self.description), e.into())
        })?;
        // Closes our copies of the merged pipe's write end.
        drop(command);

        let console = if self.description.inherit_io {
            None
        } else if let Some(merged) = merged {
            let stdin = take_stdin(&mut child)?;
            Some(FileConsole::new(stdin, merged, None::<ChildStderr>, &self.config)?)
        } else {
            Some(FileConsole::from_child(&mut child, &self.config)?)
        };

        let pid = child.id();
        let stop = CancellationToken::new();
        let (exit_tx, exit) = watch::channel(None);
        tokio::spawn(reap(
            child,
            stop.clone(),
            exit_tx,
            self.grace,
            self.description.to_string(),
        ));

        info!(command = %self.description, pid = ?pid, "Started process");
        Ok(Run {
            pid,
            console: console.map(Arc::new),
            stop,
            exit,
        })
    }
}

#[async_trait]
impl Handle for LocalHandle {
    async fn start(&self) -> Result<()> {
        let mut state = self.lock();
        if state.started {
            return Ok(());
        }
        let run = self.spawn()?;
        state.run = Some(run);
        state.started = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let console = {
            let mut state = self.lock();
            if !state.started {
                return Ok(());
            }
            state.started = false;
            let Some(run) = state.run.as_ref() else {
                return Ok(());
            };
            run.stop.cancel();
            run.console.clone()
        };
        debug!(command = %self.description, "Stop requested");

        if let Some(console) = console {
            console.close().await.map_err(|e| {
                ApplicationError::with_cause(
                    format!("failed to close stdin of {}", self.description),
                    e.into(),
                )
            })?;
        }
        Ok(())
    }

    async fn wait(&self) -> Result<()> {
        let mut exit = self
            .lock()
            .run
            .as_ref()
            .map(|run| run.exit.clone())
            .ok_or_else(|| self.never_started())?;

        let exited = exit.wait_for(Option::is_some).await.is_ok();
        if exited {
            Ok(())
        } else {
            Err(Error::application(format!(
                "lost track of {}",
                self.description
            )))
        }
    }

    fn exit_code(&self) -> Result<i32> {
        let state = self.lock();
        let run = state.run.as_ref().ok_or_else(|| self.never_started())?;
        let code = *run.exit.borrow();
        code.ok_or_else(|| Error::IllegalState(format!("{} is still running", self.description)))
    }

    fn is_running(&self) -> bool {
        self.lock()
            .run
            .as_ref()
            .is_some_and(|run| run.exit.borrow().is_none())
    }

    fn is_started(&self) -> bool {
        self.lock().started
    }

    fn console(&self) -> Result<Arc<FileConsole>> {
        let state = self.lock();
        let run = state.run.as_ref().ok_or_else(|| self.never_started())?;
        run.console.clone().ok_or_else(|| {
            Error::IllegalState(format!("{} inherits its stdio", self.description))
        })
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        let state = self.lock();
        if state.started
            && let Some(run) = state.run.as_ref()
        {
            run.stop.cancel();
        }
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.description, f)
    }
}

impl fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHandle")
            .field("description", &self.description)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

async fn reap(
    mut child: Child,
    stop: CancellationToken,
    exit: watch::Sender<Option<i32>>,
    grace: Duration,
    command: String,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = stop.cancelled() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => shutdown_child(&mut child, grace).await,
    };

    let code = match status {
        Ok(status) => exit_code(status),
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to reap process");
            -1
        }
    };
    debug!(command = %command, exit_code = code, "Process exited");
    exit.send_replace(Some(code));
}

fn take_stdin(child: &mut Child) -> Result<tokio::process::ChildStdin> {
    child
        .stdin
        .take()
        .ok_or_else(|| Error::IllegalState("child stdin is not piped".to_string()))
}

/// Point stdout and stderr at one pipe and return its read end.
#[cfg(unix)]
fn merge_stderr(command: &mut Command) -> io::Result<tokio::fs::File> {
    let (reader, writer) = io::pipe()?;
    command.stdout(writer.try_clone()?).stderr(writer);
    let reader = std::os::fd::OwnedFd::from(reader);
    Ok(tokio::fs::File::from_std(std::fs::File::from(reader)))
}

#[cfg(not(unix))]
fn merge_stderr(_command: &mut Command) -> io::Result<tokio::fs::File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "merging stderr into stdout is only supported on unix",
    ))
}
