//! OS-facing pieces of rigging: spawning processes, capturing their
//! consoles into replayable files, waiting for readiness, and leasing TCP
//! ports across unrelated processes.
//!
//! The orchestration types ([`rigging_core::Group`], [`rigging_core::ManageableUnit`])
//! live in `rigging-core`; [`Application`] is the unit implementation that
//! plugs these runtime pieces into them.
#![deny(unsafe_code)]

pub mod application;
pub mod console;
pub mod lease;
pub mod port;
pub mod process;
pub mod wait;

pub use application::Application;
pub use console::{ConsoleInput, FileConsole, PersistentReader, StreamMultiplexer};
pub use lease::{Clock, Lease, LeaseRegistry, ManualClock, SystemClock};
pub use port::{LeasedPortBinder, PortAllocator, PortBinder, is_port_available, random_port};
pub use process::{Handle, LocalHandle};
pub use wait::{
    ConsoleWaitStrategy, HealthCheck, NoOpWaitStrategy, TcpPortHealthCheck,
    UntilHealthyWaitStrategy, WaitStrategy,
};
