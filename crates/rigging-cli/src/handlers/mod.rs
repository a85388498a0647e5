//! Command handlers.
//!
//! Each handler takes the [`crate::CliContext`] plus its parsed arguments,
//! calls into the rigging crates, and formats the result for the terminal.
//! Handlers that touch the lease directory are synchronous because lease
//! claims hold a blocking file lock.

pub mod leases;
pub mod paths;
pub mod port;
pub mod release;
pub mod run;
