//! Port allocation against a real lease directory.

use std::net::{Ipv4Addr, TcpListener};

use rigging_core::{Error, RiggingConfig};
use rigging_runtime::{
    LeaseRegistry, LeasedPortBinder, PortAllocator, PortBinder, is_port_available,
};

const LOWER: u16 = 1200;
const UPPER: u16 = 1204;

fn range_is_free() -> bool {
    (LOWER..UPPER).all(is_port_available)
}

#[test]
fn test_second_bind_of_same_port_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let binder = LeasedPortBinder::from_config(&config).unwrap();
    let port = rigging_runtime::random_port().unwrap();

    assert!(binder.try_bind(port).unwrap());
    assert!(!binder.try_bind(port).unwrap());
    assert!(config.port_dir().join(port.to_string()).exists());
}

#[test]
fn test_allocator_walks_range_then_exhausts() {
    if !range_is_free() {
        eprintln!("ports {LOWER}..{UPPER} are in use on this host, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let mut allocator = PortAllocator::leased(LOWER, UPPER, &config).unwrap();

    let ports: Vec<u16> = (0..4).map(|_| allocator.next().unwrap()).collect();
    assert_eq!(ports, vec![1200, 1201, 1202, 1203]);
    assert!(matches!(
        allocator.next(),
        Err(Error::PortsExhausted {
            lower: LOWER,
            upper: UPPER
        })
    ));
}

#[test]
fn test_allocators_sharing_a_directory_never_collide() {
    if !range_is_free() {
        eprintln!("ports {LOWER}..{UPPER} are in use on this host, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let mut first = PortAllocator::leased(LOWER, UPPER, &config).unwrap();
    let mut second = PortAllocator::leased(LOWER, UPPER, &config).unwrap();

    let mut seen = vec![
        first.next().unwrap(),
        second.next().unwrap(),
        first.next().unwrap(),
        second.next().unwrap(),
    ];
    seen.sort_unstable();
    assert_eq!(seen, vec![1200, 1201, 1202, 1203]);
}

#[test]
fn test_locally_bound_port_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
    let taken = listener.local_addr().unwrap().port();

    let binder = LeasedPortBinder::new(LeaseRegistry::from_config(&config).unwrap());
    assert!(!binder.try_bind(taken).unwrap());
    assert!(!config.port_dir().join(taken.to_string()).exists());
}

#[test]
fn test_allocated_port_stays_leased_after_allocator_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let free = rigging_runtime::random_port().unwrap();

    let port = PortAllocator::leased(free, free + 1, &config)
        .unwrap()
        .next()
        .unwrap();

    assert_eq!(port, free);
    assert!(config.port_dir().join(port.to_string()).exists());
    let other = LeaseRegistry::from_config(&config).unwrap();
    assert!(!other.try_acquire(port).unwrap());
}

#[test]
fn test_released_lease_can_be_reacquired() {
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());
    let registry = LeaseRegistry::from_config(&config).unwrap();
    let other = LeaseRegistry::from_config(&config).unwrap();

    assert!(registry.try_acquire(4242).unwrap());
    assert!(!other.try_acquire(4242).unwrap());
    assert!(other.release(4242).unwrap());
    assert!(other.try_acquire(4242).unwrap());
}

#[test]
fn test_concurrent_claims_grant_each_port_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = RiggingConfig::new(dir.path());

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let config = config.clone();
                scope.spawn(move || {
                    let registry = LeaseRegistry::from_config(&config).unwrap();
                    usize::from(registry.try_acquire(4343).unwrap())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(winners, 1);
}
