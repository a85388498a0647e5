//! Process handles and shutdown.

mod handle;
mod local;
mod shutdown;

pub use handle::Handle;
pub use local::LocalHandle;
pub use shutdown::{DEFAULT_GRACE_PERIOD, exit_code, shutdown_child};
