//! Port leases shared between processes through the filesystem.

mod clock;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{LOCK_FILE, Lease, LeaseRegistry};
