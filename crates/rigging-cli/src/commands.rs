//! Available subcommands.

use clap::Subcommand;
use rigging_runtime::port::UNPRIVILEGED_LOWER;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Lease free TCP ports and print them, one per line
    Port {
        /// Lowest port to consider
        #[arg(long, default_value_t = UNPRIVILEGED_LOWER)]
        lower: u16,
        /// Port above the highest one to consider
        #[arg(long, default_value_t = u16::MAX)]
        upper: u16,
        /// How many ports to lease
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// List port leases
    Leases {
        /// Include expired leases
        #[arg(short, long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Remove port leases
    Release {
        /// Ports to release
        #[arg(required = true)]
        ports: Vec<u16>,
    },

    /// Show resolved rigging directories
    Paths,

    /// Start one process per phase, wait for Ctrl-C, then stop them in reverse
    Run {
        /// Command line of one phase; repeat for later phases
        #[arg(long = "phase", required = true)]
        phases: Vec<String>,
        /// Treat a process as started once a stdout line matches this regex
        #[arg(long)]
        ready: Option<String>,
    },
}
