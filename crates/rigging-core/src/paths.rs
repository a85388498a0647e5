//! Where rigging keeps console captures and port leases.
//!
//! The root is resolved once and carried in [`crate::RiggingConfig`];
//! nothing here caches it.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the temp root.
pub const TEMP_DIR_ENV: &str = "RIGGING_TEMP_DIR";

/// `<system temp>/rigging`.
pub fn default_temp_root() -> PathBuf {
    env::temp_dir().join("rigging")
}

/// `RIGGING_TEMP_DIR` when set and non-blank, else [`default_temp_root`].
pub fn temp_root() -> PathBuf {
    match env::var(TEMP_DIR_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => default_temp_root(),
    }
}

/// A working directory could not be prepared.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("working directory path is empty")]
    Empty,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Create `path` and its parents unless it already is a directory.
///
/// Lease and console directories are shared between processes, so losing
/// the creation race to another process is success.
pub fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.exists() && !path.is_dir() => {
            Err(PathError::NotADirectory(path.to_path_buf()))
        }
        Err(source) => Err(PathError::Create {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_root_is_under_system_temp() {
        let root = default_temp_root();
        assert!(root.starts_with(env::temp_dir()));
        assert!(root.ends_with("rigging"));
    }

    #[test]
    fn creates_nested_directories_and_tolerates_existing() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("port").join("leases");

        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn file_in_the_way_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("console");
        fs::write(&file, b"x").unwrap();

        let err = ensure_dir(&file).unwrap_err();
        assert!(matches!(err, PathError::NotADirectory(p) if p == file));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(ensure_dir(Path::new("")), Err(PathError::Empty)));
    }
}
