//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Lease test ports and run process groups from the shell.
#[derive(Parser)]
#[command(name = "rigging")]
#[command(about = "Lease TCP ports and supervise process groups for integration tests")]
#[command(version)]
pub struct Cli {
    /// Root directory for leases and console captures
    #[arg(long = "temp-dir", env = "RIGGING_TEMP_DIR", global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
