//! Port allocation coordinated through leases.

mod allocator;
mod binder;

pub use allocator::{PortAllocator, UNPRIVILEGED_LOWER};
pub use binder::{LeasedPortBinder, PortBinder, is_port_available, random_port};
