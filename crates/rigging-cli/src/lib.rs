//! Command-line front end for rigging: lease test ports for other programs
//! and run phased process groups from a shell.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod context;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use context::CliContext;
pub use error::{CliError, exit_code_for};
pub use parser::Cli;
