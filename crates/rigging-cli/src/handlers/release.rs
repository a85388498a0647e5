//! Release command handler.

use anyhow::Result;
use rigging_runtime::LeaseRegistry;

use crate::CliContext;

/// Delete each lease, returning the ports that actually had one.
pub fn release(ctx: &CliContext, ports: &[u16]) -> Result<Vec<u16>> {
    let registry = LeaseRegistry::from_config(&ctx.config)?;
    let mut released = Vec::new();
    for &port in ports {
        if registry.release(port)? {
            released.push(port);
        }
    }
    Ok(released)
}

/// Execute the release command.
pub fn execute(ctx: &CliContext, ports: &[u16]) -> Result<()> {
    let released = release(ctx, ports)?;
    for port in ports {
        if released.contains(port) {
            println!("released {port}");
        } else {
            println!("no lease for {port}");
        }
    }
    Ok(())
}
