//! Port command handler.
//!
//! Leases outlive this process and last until they expire; the point is
//! to hand ports to another program. `rigging release` gives them back
//! early.

use anyhow::Result;
use rigging_runtime::{LeaseRegistry, LeasedPortBinder, PortAllocator};
use tracing::warn;

use crate::{CliContext, CliError};

/// Lease `count` ports from `[lower, upper)`.
///
/// If the range runs out part way, the ports already leased are released
/// again before the error is returned.
pub fn allocate(ctx: &CliContext, lower: u16, upper: u16, count: usize) -> Result<Vec<u16>> {
    if count == 0 {
        return Err(CliError::Arguments("count must be at least 1".to_string()).into());
    }

    let registry = LeaseRegistry::from_config(&ctx.config)?;
    let mut allocator = PortAllocator::new(lower, upper, LeasedPortBinder::new(registry))?;

    let mut ports = Vec::with_capacity(count);
    for _ in 0..count {
        match allocator.next() {
            Ok(port) => ports.push(port),
            Err(e) => {
                for port in &ports {
                    if let Err(release) = allocator.binder().registry().release(*port) {
                        warn!(port = %port, error = %release, "Failed to release lease");
                    }
                }
                return Err(e.into());
            }
        }
    }
    Ok(ports)
}

/// Execute the port command.
pub fn execute(ctx: &CliContext, lower: u16, upper: u16, count: usize) -> Result<()> {
    for port in allocate(ctx, lower, upper, count)? {
        println!("{port}");
    }
    Ok(())
}
