//! Deciding whether a single port can be claimed.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

use rigging_core::{Result, RiggingConfig};

use crate::lease::LeaseRegistry;

/// Claims a port for the caller, or reports that it cannot.
pub trait PortBinder: Send + Sync {
    /// `Ok(true)` when `port` is now claimed for the caller.
    fn try_bind(&self, port: u16) -> Result<bool>;
}

impl<F> PortBinder for F
where
    F: Fn(u16) -> Result<bool> + Send + Sync,
{
    fn try_bind(&self, port: u16) -> Result<bool> {
        self(port)
    }
}

/// Check if a port can be bound on every interface.
///
/// The listener is dropped immediately, so a `true` answer can be stale by
/// the time the caller binds for real.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .and_then(|listener| listener.local_addr())
        .is_ok()
}

/// Let the OS pick a free port. No lease is taken.
pub fn random_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Binder that requires the port to be free on this host and unleased by
/// every other process sharing the lease directory.
#[derive(Debug)]
pub struct LeasedPortBinder {
    registry: LeaseRegistry,
}

impl LeasedPortBinder {
    pub const fn new(registry: LeaseRegistry) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &RiggingConfig) -> Result<Self> {
        Ok(Self::new(LeaseRegistry::from_config(config)?))
    }

    pub const fn registry(&self) -> &LeaseRegistry {
        &self.registry
    }
}

impl PortBinder for LeasedPortBinder {
    fn try_bind(&self, port: u16) -> Result<bool> {
        if !is_port_available(port) {
            return Ok(false);
        }
        self.registry.try_acquire(port)
    }
}
