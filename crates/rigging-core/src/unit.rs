//! The capability contract every orchestrated process exposes.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// A startable, stoppable entity sequenced by a [`crate::Group`].
///
/// `start` and `stop` initiate a transition and should return promptly.
/// `await_start` and `await_stop` wait for the transition to complete and
/// may take arbitrarily long; an implementation that observes cancellation
/// while waiting must return [`crate::Error::Interrupted`] rather than
/// swallowing it.
///
/// Units are owned outside of any group and shared through `Arc`, so every
/// method takes `&self`; implementations keep their mutable state behind
/// interior mutability.
#[async_trait]
pub trait ManageableUnit: Send + Sync + fmt::Display {
    /// Initiate start.
    async fn start(&self) -> Result<()>;

    /// Initiate stop.
    async fn stop(&self) -> Result<()>;

    /// Wait until the unit has reached its started state.
    async fn await_start(&self) -> Result<()>;

    /// Wait until the unit has stopped.
    async fn await_stop(&self) -> Result<()>;

    /// Non-blocking liveness query, used by wait strategies to notice early
    /// process death.
    fn is_running(&self) -> bool;
}
