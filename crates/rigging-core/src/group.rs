//! Phased start/stop orchestration.
//!
//! A [`Group`] is an ordered list of phases. Units inside a phase are
//! started together: every `start()` in the phase is issued before any
//! `await_start()`, and the next phase begins only once the whole phase is
//! up. Stopping mirrors this in reverse phase order.
//!
//! ```ignore
//! let group = Group::of([database, broker]).then([service]);
//! group.start().await?;
//! // ... exercise the service ...
//! group.stop().await?;
//! ```
//!
//! Start is all-or-nothing. When any unit fails, every unit that had
//! successfully initiated start is stopped, newest first, and the original
//! failure is returned with any cleanup failures attached as suppressed.
//! Stop never skips a unit because another failed; all failures are
//! reported together.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{ApplicationError, Error, Result};
use crate::unit::ManageableUnit;

/// Shared handle to a unit sequenced by a group.
pub type SharedUnit = Arc<dyn ManageableUnit>;

/// Ordered phases of units started and stopped together.
#[derive(Clone, Default)]
pub struct Group {
    phases: Vec<Vec<SharedUnit>>,
}

impl Group {
    /// Create a group whose first phase holds `units`.
    pub fn of(units: impl IntoIterator<Item = SharedUnit>) -> Self {
        Self {
            phases: vec![units.into_iter().collect()],
        }
    }

    /// Append a phase that starts after, and stops before, every earlier one.
    #[must_use]
    pub fn then(mut self, units: impl IntoIterator<Item = SharedUnit>) -> Self {
        self.phases.push(units.into_iter().collect());
        self
    }

    /// Phases in start order.
    pub fn phases(&self) -> &[Vec<SharedUnit>] {
        &self.phases
    }

    /// Total number of units across all phases.
    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every phase in order, rolling back on the first failure.
    pub async fn start(&self) -> Result<()> {
        // Newest first, so rollback can walk it front to back.
        let mut started: VecDeque<SharedUnit> = VecDeque::with_capacity(self.len());

        let Err((unit, cause)) = self.start_phases(&mut started).await else {
            return Ok(());
        };

        error!(unit = %unit, error = %cause, "Failed to start");

        // A unit whose start() failed is in an unknown state and is not in
        // `started`, so it is left alone here.
        let cleanup = stop_units(started.make_contiguous()).await;
        Err(start_failure(cause, cleanup))
    }

    async fn start_phases(
        &self,
        started: &mut VecDeque<SharedUnit>,
    ) -> std::result::Result<(), (SharedUnit, Error)> {
        for phase in &self.phases {
            for unit in phase {
                debug!(unit = %unit, "Initiating start");
                unit.start().await.map_err(|e| (Arc::clone(unit), e))?;
                started.push_front(Arc::clone(unit));
                debug!(unit = %unit, "Start initiated");
            }

            for unit in phase {
                debug!(unit = %unit, "Awaiting start");
                unit.await_start().await.map_err(|e| (Arc::clone(unit), e))?;
                debug!(unit = %unit, "Started");
            }
        }
        Ok(())
    }

    /// Stop every phase in reverse order, attempting every unit.
    ///
    /// Failures are merged into one [`ApplicationError`]: the first failure
    /// is its cause, later ones are suppressed in the order they happened.
    /// An interruption aborts immediately and is returned as-is.
    pub async fn stop(&self) -> Result<()> {
        let mut failures = Vec::new();

        for phase in self.phases.iter().rev() {
            match stop_units(phase).await {
                Ok(mut phase_failures) => failures.append(&mut phase_failures),
                Err(interrupted) => {
                    log_discarded(&failures);
                    return Err(interrupted);
                }
            }
        }

        match aggregate("failed to stop group", failures) {
            Some(err) => Err(Error::Application(err)),
            None => Ok(()),
        }
    }

    /// Wait for every unit to stop on its own, in start order.
    pub async fn await_stop(&self) -> Result<()> {
        for phase in &self.phases {
            for unit in phase {
                unit.await_stop().await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phases: Vec<Vec<String>> = self
            .phases
            .iter()
            .map(|phase| phase.iter().map(ToString::to_string).collect())
            .collect();
        f.debug_struct("Group").field("phases", &phases).finish()
    }
}

/// Issue `stop()` on every unit, then `await_stop()` on each in turn.
///
/// `stop()` failures are collected and never skip a unit. The first
/// `await_stop()` failure ends the await loop for the remaining units.
/// `Err` is returned only for an interruption.
async fn stop_units(units: &[SharedUnit]) -> Result<Vec<Error>> {
    let mut failures = Vec::new();

    for unit in units {
        debug!(unit = %unit, "Initiating stop");
        match unit.stop().await {
            Ok(()) => debug!(unit = %unit, "Stop initiated"),
            Err(Error::Interrupted) => {
                log_discarded(&failures);
                return Err(Error::Interrupted);
            }
            Err(e) => {
                error!(unit = %unit, error = %e, "Failed to stop");
                failures.push(e);
            }
        }
    }

    for unit in units {
        debug!(unit = %unit, "Awaiting stop");
        match unit.await_stop().await {
            Ok(()) => debug!(unit = %unit, "Stopped"),
            Err(Error::Interrupted) => {
                log_discarded(&failures);
                return Err(Error::Interrupted);
            }
            Err(e) => {
                error!(unit = %unit, error = %e, "Failed awaiting stop");
                failures.push(e);
                break;
            }
        }
    }

    Ok(failures)
}

/// First failure becomes the cause, the rest are suppressed.
fn aggregate(message: &str, failures: Vec<Error>) -> Option<ApplicationError> {
    let mut failures = failures.into_iter();
    let first = failures.next()?;
    let mut err = ApplicationError::with_cause(message, first);
    for failure in failures {
        err.add_suppressed(failure);
    }
    Some(err)
}

/// Combine the original start failure with the outcome of its rollback.
fn start_failure(cause: Error, cleanup: Result<Vec<Error>>) -> Error {
    let cleanup_failures = match cleanup {
        Ok(failures) => failures,
        Err(interrupted) => {
            warn!(error = %cause, "Rollback interrupted, original failure discarded");
            return interrupted;
        }
    };

    let mut err = match cause {
        Error::Interrupted => {
            log_discarded(&cleanup_failures);
            return Error::Interrupted;
        }
        Error::Application(err) => err,
        other => ApplicationError::caused_by(other),
    };

    for failure in cleanup_failures {
        warn!(error = %failure, "Rollback failure suppressed");
        err.add_suppressed(failure);
    }

    Error::Application(err)
}

fn log_discarded(failures: &[Error]) {
    for failure in failures {
        warn!(error = %failure, "Failure discarded by interruption");
    }
}
