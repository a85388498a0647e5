//! Round-robin port scanning over a half-open range.

use rigging_core::{Error, Result, RiggingConfig};
use tracing::{debug, trace};

use super::binder::{LeasedPortBinder, PortBinder};

/// Lowest port that does not need elevated privileges.
pub const UNPRIVILEGED_LOWER: u16 = 1024;

/// Hands out ports from `[lower, upper)`.
///
/// The cursor survives between calls, so successive [`PortAllocator::next`]
/// calls walk forward through the range and wrap around at `upper`.
#[derive(Debug)]
pub struct PortAllocator<B = LeasedPortBinder> {
    lower: u16,
    upper: u16,
    current: u16,
    binder: B,
}

impl<B: PortBinder> PortAllocator<B> {
    pub fn new(lower: u16, upper: u16, binder: B) -> Result<Self> {
        if lower >= upper {
            return Err(Error::InvalidArgument(format!(
                "lower port {lower} must be below upper port {upper}"
            )));
        }
        Ok(Self {
            lower,
            upper,
            current: lower,
            binder,
        })
    }

    pub const fn lower(&self) -> u16 {
        self.lower
    }

    pub const fn upper(&self) -> u16 {
        self.upper
    }

    pub const fn binder(&self) -> &B {
        &self.binder
    }

    /// Claim the next port the binder accepts.
    ///
    /// Gives up with [`Error::PortsExhausted`] after one full lap. A binder
    /// error ends the scan immediately.
    pub fn next(&mut self) -> Result<u16> {
        for _ in self.lower..self.upper {
            let port = self.current;
            self.current = if port + 1 >= self.upper {
                self.lower
            } else {
                port + 1
            };

            if self.binder.try_bind(port)? {
                debug!(port = %port, "Allocated port");
                return Ok(port);
            }
            trace!(port = %port, "Port unavailable, trying next");
        }

        Err(Error::PortsExhausted {
            lower: self.lower,
            upper: self.upper,
        })
    }
}

impl PortAllocator<LeasedPortBinder> {
    /// Lease-backed allocator over `[lower, upper)`.
    pub fn leased(lower: u16, upper: u16, config: &RiggingConfig) -> Result<Self> {
        Self::new(lower, upper, LeasedPortBinder::from_config(config)?)
    }

    /// Lease-backed allocator over every unprivileged port.
    pub fn unprivileged(config: &RiggingConfig) -> Result<Self> {
        Self::leased(UNPRIVILEGED_LOWER, u16::MAX, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;
    use std::sync::Mutex;

    /// Accepts each port once, like a lease that never expires.
    fn once_binder() -> impl Fn(u16) -> Result<bool> + Send + Sync {
        let taken = Mutex::new(HashSet::new());
        move |port: u16| -> Result<bool> { Ok(taken.lock().unwrap().insert(port)) }
    }

    #[test]
    fn walks_range_then_reports_exhaustion() {
        let mut allocator = PortAllocator::new(1200, 1204, once_binder()).unwrap();

        let ports: Vec<u16> = (0..4).map(|_| allocator.next().unwrap()).collect();
        assert_eq!(ports, vec![1200, 1201, 1202, 1203]);

        let err = allocator.next().unwrap_err();
        assert!(matches!(
            err,
            Error::PortsExhausted {
                lower: 1200,
                upper: 1204
            }
        ));
    }

    #[test]
    fn wraps_around_to_lower_bound() {
        let refused = Mutex::new(HashSet::from([1201_u16]));
        let binder = move |port: u16| -> Result<bool> { Ok(!refused.lock().unwrap().remove(&port)) };
        let mut allocator = PortAllocator::new(1200, 1203, binder).unwrap();

        assert_eq!(allocator.next().unwrap(), 1200);
        // 1201 refused once, so the cursor moves past it.
        assert_eq!(allocator.next().unwrap(), 1202);
        assert_eq!(allocator.next().unwrap(), 1200);
        assert_eq!(allocator.next().unwrap(), 1201);
    }

    #[test]
    fn binder_error_stops_the_scan() {
        let calls = Mutex::new(Vec::new());
        let binder = |port: u16| -> Result<bool> {
            calls.lock().unwrap().push(port);
            Err(Error::Lease {
                port,
                source: io::Error::other("disk gone"),
            })
        };
        let mut allocator = PortAllocator::new(3000, 3010, binder).unwrap();

        assert!(matches!(
            allocator.next(),
            Err(Error::Lease { port: 3000, .. })
        ));
        assert_eq!(*calls.lock().unwrap(), vec![3000]);
    }

    #[test]
    fn rejects_empty_range() {
        assert!(matches!(
            PortAllocator::new(5000, 5000, once_binder()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            PortAllocator::new(5001, 5000, once_binder()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn single_port_range() {
        let mut allocator = PortAllocator::new(6000, 6001, once_binder()).unwrap();
        assert_eq!(allocator.next().unwrap(), 6000);
        assert!(allocator.next().is_err());
    }
}
