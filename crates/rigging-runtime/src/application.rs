//! A described process plus the rule for when it counts as started.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rigging_core::{Description, Error, ManageableUnit, Result, RiggingConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::console::FileConsole;
use crate::process::{Handle, LocalHandle};
use crate::wait::{NoOpWaitStrategy, WaitStrategy};

/// Composes a [`Description`], a [`Handle`] that runs it and a
/// [`WaitStrategy`] into a unit a group can sequence.
///
/// Blocking waits end with [`Error::Interrupted`] once the application's
/// cancellation token fires.
pub struct Application {
    description: Description,
    handle: Box<dyn Handle>,
    wait_strategy: Box<dyn WaitStrategy>,
    cancel: CancellationToken,
}

impl Application {
    pub fn new(
        description: Description,
        handle: impl Handle + 'static,
        wait_strategy: impl WaitStrategy + 'static,
    ) -> Self {
        Self {
            description,
            handle: Box::new(handle),
            wait_strategy: Box::new(wait_strategy),
            cancel: CancellationToken::new(),
        }
    }

    /// Run `description` as a child of this process.
    pub fn local(
        description: Description,
        wait_strategy: impl WaitStrategy + 'static,
        config: &RiggingConfig,
    ) -> Self {
        let handle = LocalHandle::new(description.clone(), config.clone());
        Self::new(description, handle, wait_strategy)
    }

    /// Local process that counts as started once launched.
    pub fn local_unchecked(description: Description, config: &RiggingConfig) -> Self {
        Self::local(description, NoOpWaitStrategy, config)
    }

    /// Share a cancellation token, e.g. one per test or per CLI session.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub const fn description(&self) -> &Description {
        &self.description
    }

    pub fn handle(&self) -> &dyn Handle {
        self.handle.as_ref()
    }

    pub fn console(&self) -> Result<Arc<FileConsole>> {
        self.handle.console()
    }

    pub fn exit_code(&self) -> Result<i32> {
        self.handle.exit_code()
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_started()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Interrupt every current and future wait on this application.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl ManageableUnit for Application {
    async fn start(&self) -> Result<()> {
        info!(command = %self.description, "Starting application");
        self.handle.start().await
    }

    async fn stop(&self) -> Result<()> {
        info!(command = %self.description, "Stopping application");
        self.handle.stop().await
    }

    async fn await_start(&self) -> Result<()> {
        self.wait_strategy
            .wait_for(self.handle.as_ref(), &self.cancel)
            .await?;
        debug!(command = %self.description, "Application is ready");
        Ok(())
    }

    async fn await_stop(&self) -> Result<()> {
        if !self.handle.is_running() {
            return Ok(());
        }
        tokio::select! {
            result = self.handle.wait() => result,
            () = self.cancel.cancelled() => Err(Error::Interrupted),
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_running()
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.description, f)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("description", &self.description)
            .field("running", &self.handle.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Handle whose process "runs" until stopped.
    #[derive(Default)]
    struct FakeHandle {
        calls: Mutex<Vec<&'static str>>,
        running: AtomicBool,
        stopped: tokio::sync::Notify,
    }

    #[async_trait]
    impl Handle for Arc<FakeHandle> {
        async fn start(&self) -> Result<()> {
            self.calls.lock().unwrap().push("start");
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.calls.lock().unwrap().push("stop");
            self.running.store(false, Ordering::SeqCst);
            self.stopped.notify_waiters();
            Ok(())
        }

        async fn wait(&self) -> Result<()> {
            let stopped = self.stopped.notified();
            if self.running.load(Ordering::SeqCst) {
                stopped.await;
            }
            Ok(())
        }

        fn exit_code(&self) -> Result<i32> {
            Ok(0)
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn is_started(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn console(&self) -> Result<Arc<FileConsole>> {
            Err(Error::IllegalState("no console".to_string()))
        }
    }

    fn application() -> (Application, Arc<FakeHandle>) {
        let handle = Arc::new(FakeHandle::default());
        let app = Application::new(Description::new("fake"), Arc::clone(&handle), NoOpWaitStrategy);
        (app, handle)
    }

    #[tokio::test]
    async fn delegates_lifecycle_to_handle() {
        let (app, handle) = application();

        app.start().await.unwrap();
        app.await_start().await.unwrap();
        assert!(app.is_running());

        app.stop().await.unwrap();
        app.await_stop().await.unwrap();
        assert!(!app.is_running());
        assert_eq!(*handle.calls.lock().unwrap(), vec!["start", "stop"]);
    }

    #[tokio::test]
    async fn await_stop_returns_immediately_when_not_running() {
        let (app, _handle) = application();
        app.await_stop().await.unwrap();
    }

    #[tokio::test]
    async fn interrupt_ends_await_stop() {
        let (app, _handle) = application();
        app.start().await.unwrap();
        app.interrupt();

        let err = app.await_stop().await.unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn displays_command() {
        let (app, _handle) = application();
        assert_eq!(app.to_string(), "fake");
    }
}
