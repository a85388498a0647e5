//! Cross-process lease files, one per claimed port.
//!
//! Layout under the lease directory:
//! ```text
//! lock      advisory lock serialising every claim
//! <port>    8-byte big-endian expiry, epoch milliseconds
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use rigging_core::{Error, Result, RiggingConfig, ensure_dir};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};

/// Name of the lock file inside the lease directory.
pub const LOCK_FILE: &str = "lock";

/// Holds the directory lock until dropped.
struct DirectoryLock(File);

impl DirectoryLock {
    fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self(file))
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            warn!(error = %e, "Failed to unlock lease directory");
        }
    }
}

/// A lease as found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lease {
    pub port: u16,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Claims ports through expiring lease files shared by every process
/// using the same directory.
///
/// A lease lasts until its expiry or an explicit [`LeaseRegistry::release`],
/// independent of the registry that wrote it: a port handed out by
/// `PortAllocator::next` stays claimed after the allocator is gone.
/// [`LeaseRegistry::with_release_on_drop`] ties leases to the registry's
/// lifetime instead.
pub struct LeaseRegistry {
    dir: PathBuf,
    lock_path: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    acquired: Mutex<BTreeSet<u16>>,
    release_on_drop: bool,
}

impl LeaseRegistry {
    /// Open (creating if needed) the lease directory at `dir`.
    pub fn new(dir: impl Into<PathBuf>, ttl: std::time::Duration) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        let ttl = Duration::from_std(ttl)
            .map_err(|_| Error::InvalidArgument(format!("lease ttl {ttl:?} is too large")))?;

        Ok(Self {
            lock_path: dir.join(LOCK_FILE),
            dir,
            ttl,
            clock: Arc::new(SystemClock),
            acquired: Mutex::new(BTreeSet::new()),
            release_on_drop: false,
        })
    }

    /// Registry over the config's port directory and lease TTL.
    pub fn from_config(config: &RiggingConfig) -> Result<Self> {
        Self::new(config.port_dir(), config.lease_ttl)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Delete this registry's leases when it is dropped.
    #[must_use]
    pub const fn with_release_on_drop(mut self, release: bool) -> Self {
        self.release_on_drop = release;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lease_path(&self, port: u16) -> PathBuf {
        self.dir.join(port.to_string())
    }

    /// Claim `port` if its lease is absent, unreadable or expired.
    ///
    /// Returns `Ok(false)` when another claimant holds a live lease.
    pub fn try_acquire(&self, port: u16) -> Result<bool> {
        let acquired = self
            .locked(|| self.acquire_if_available(port))
            .map_err(|source| Error::Lease { port, source })?;

        if acquired {
            self.acquired
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(port);
            debug!(port = %port, "Leased port");
        } else {
            trace!(port = %port, "Port lease is held elsewhere");
        }
        Ok(acquired)
    }

    /// Delete the lease for `port`. Returns whether a lease file existed.
    pub fn release(&self, port: u16) -> Result<bool> {
        let removed = self
            .locked(|| match fs::remove_file(self.lease_path(port)) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            })
            .map_err(|source| Error::Lease { port, source })?;

        self.acquired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&port);
        if removed {
            debug!(port = %port, "Released port lease");
        }
        Ok(removed)
    }

    /// Ports this registry has claimed and not released.
    pub fn acquired(&self) -> Vec<u16> {
        self.acquired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Every readable lease in the directory, live or expired, by port.
    ///
    /// Files that are not named after a port or hold fewer than eight
    /// bytes are skipped.
    pub fn leases(&self) -> Result<Vec<Lease>> {
        let mut leases = self.locked(|| {
            let mut leases = Vec::new();
            for entry in fs::read_dir(&self.dir)? {
                let entry = entry?;
                let Some(port) = entry.file_name().to_str().and_then(|n| n.parse::<u16>().ok())
                else {
                    continue;
                };
                match File::open(entry.path()).and_then(|mut file| read_expiry(&mut file)) {
                    Ok(Some(expires_at)) => leases.push(Lease { port, expires_at }),
                    Ok(None) => trace!(port = %port, "Skipping truncated lease file"),
                    Err(e) => debug!(port = %port, error = %e, "Skipping unreadable lease file"),
                }
            }
            Ok(leases)
        })?;
        leases.sort_by_key(|lease| lease.port);
        Ok(leases)
    }

    /// Current time according to this registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn locked<T>(&self, f: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
        let _lock = DirectoryLock::acquire(&self.lock_path)?;
        f()
    }

    fn acquire_if_available(&self, port: u16) -> io::Result<bool> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lease_path(port))?;

        let now = self.clock.now();
        if let Some(expires_at) = read_expiry(&mut file)?
            && now < expires_at
        {
            return Ok(false);
        }

        let expiry = now.checked_add_signed(self.ttl).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("lease ttl {} runs past the representable time range", self.ttl),
            )
        })?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&expiry.timestamp_millis().to_be_bytes())?;
        file.set_len(8)?;
        file.flush()?;
        Ok(true)
    }
}

impl Drop for LeaseRegistry {
    fn drop(&mut self) {
        if !self.release_on_drop {
            return;
        }
        for port in self.acquired() {
            if let Err(e) = self.release(port) {
                warn!(port = %port, error = %e, "Failed to release port lease");
            }
        }
    }
}

impl std::fmt::Debug for LeaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseRegistry")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .field("release_on_drop", &self.release_on_drop)
            .finish_non_exhaustive()
    }
}

/// Read the expiry at offset zero. `None` when fewer than eight bytes exist.
fn read_expiry(file: &mut File) -> io::Result<Option<DateTime<Utc>>> {
    let mut bytes = [0u8; 8];
    file.seek(SeekFrom::Start(0))?;
    match file.read_exact(&mut bytes) {
        Ok(()) => Ok(DateTime::from_timestamp_millis(i64::from_be_bytes(bytes))),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::ManualClock;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_262_304_000_000).unwrap()
    }

    fn write_expiry(dir: &Path, port: u16, at: DateTime<Utc>) {
        fs::write(dir.join(port.to_string()), at.timestamp_millis().to_be_bytes()).unwrap();
    }

    fn read_back(dir: &Path, port: u16) -> DateTime<Utc> {
        read_expiry(&mut File::open(dir.join(port.to_string())).unwrap())
            .unwrap()
            .unwrap()
    }

    fn registry(dir: &Path) -> (LeaseRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now()));
        let registry = LeaseRegistry::new(dir, std::time::Duration::from_secs(86_400))
            .unwrap()
            .with_clock(Arc::clone(&clock));
        (registry, clock)
    }

    #[test]
    fn absent_lease_is_claimed_for_one_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(dir.path());

        assert!(registry.try_acquire(5555).unwrap());
        assert_eq!(read_back(dir.path(), 5555), now() + Duration::days(1));
        assert_eq!(registry.acquired(), vec![5555]);
    }

    #[test]
    fn live_lease_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(dir.path());
        let held_until = now() + Duration::hours(1);
        write_expiry(dir.path(), 12345, held_until);

        assert!(!registry.try_acquire(12345).unwrap());
        assert_eq!(read_back(dir.path(), 12345), held_until);
    }

    #[test]
    fn empty_lease_file_is_claimable() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(dir.path());
        File::create(dir.path().join("8888")).unwrap();

        assert!(registry.try_acquire(8888).unwrap());
        assert_eq!(read_back(dir.path(), 8888), now() + Duration::days(1));
    }

    #[test]
    fn expired_lease_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, clock) = registry(dir.path());
        write_expiry(dir.path(), 12345, now() + Duration::hours(1));

        clock.advance(Duration::hours(1));
        assert!(registry.try_acquire(12345).unwrap());
        assert_eq!(
            read_back(dir.path(), 12345),
            now() + Duration::hours(1) + Duration::days(1)
        );
    }

    #[test]
    fn second_claim_in_same_directory_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = registry(dir.path());
        let (second, _) = registry(dir.path());

        assert!(first.try_acquire(4000).unwrap());
        assert!(!second.try_acquire(4000).unwrap());
    }

    #[test]
    fn release_deletes_lease_and_allows_reclaim() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(dir.path());

        assert!(registry.try_acquire(4001).unwrap());
        assert!(registry.release(4001).unwrap());
        assert!(!registry.release(4001).unwrap());
        assert!(registry.acquired().is_empty());
        assert!(registry.try_acquire(4001).unwrap());
    }

    #[test]
    fn leases_outlive_the_registry_by_default() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (registry, _clock) = registry(dir.path());
            assert!(registry.try_acquire(4002).unwrap());
        }
        assert!(dir.path().join("4002").exists());

        let (other, _clock) = registry(dir.path());
        assert!(!other.try_acquire(4002).unwrap());
    }

    #[test]
    fn release_on_drop_removes_own_leases_only() {
        let dir = tempfile::tempdir().unwrap();
        write_expiry(dir.path(), 4004, now() + Duration::hours(1));
        {
            let (registry, _clock) = registry(dir.path());
            let registry = registry.with_release_on_drop(true);
            assert!(registry.try_acquire(4003).unwrap());
        }
        assert!(!dir.path().join("4003").exists());
        assert!(dir.path().join("4004").exists());
    }

    #[test]
    fn ttl_past_the_calendar_fails_the_claim() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LeaseRegistry::new(
            dir.path(),
            std::time::Duration::from_secs(1_000_000_000_000_000),
        )
        .unwrap()
        .with_clock(ManualClock::new(now()));

        let err = registry.try_acquire(4555).unwrap_err();

        assert!(matches!(err, Error::Lease { port: 4555, .. }));
        assert!(registry.acquired().is_empty());
    }

    #[test]
    fn leases_lists_ports_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(dir.path());
        registry.try_acquire(7001).unwrap();
        write_expiry(dir.path(), 7000, now() - Duration::hours(1));
        File::create(dir.path().join("7002")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let leases = registry.leases().unwrap();
        let ports: Vec<u16> = leases.iter().map(|l| l.port).collect();
        assert_eq!(ports, vec![7000, 7001]);
        assert!(!leases[0].is_live(registry.now()));
        assert!(leases[1].is_live(registry.now()));
    }
}
