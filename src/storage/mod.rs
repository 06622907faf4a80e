//! File-backed stores of the hub
//!
//! - [`assets`] - uploaded module files under the files directory
//! - [`descriptions`] - asset descriptions persisted as JSON
//! - [`snapshot`] - crash-recovery snapshot of the topology
//!
//! All writes go through a temp file followed by a rename, so a crash never
//! leaves a half-written store behind.

pub mod assets;
pub mod descriptions;
pub mod snapshot;

pub use assets::{AssetEntry, AssetStore};
pub use descriptions::DescriptionStore;
pub use snapshot::SnapshotStore;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the file-backed stores
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("I/O error during '{}' on {}: {}", .operation, .path.display(), .source)]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Asset name is empty or not a plain file name
    #[error("Invalid asset name: {0:?}")]
    InvalidName(String),

    /// Descriptions could not be encoded or decoded
    #[error("Descriptions encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(operation: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }
}

/// Sibling temp path used for atomic replacement of `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

/// Write `contents` to `path` through a temp file and rename
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let temp = temp_path(path);
    std::fs::write(&temp, contents).map_err(StorageError::io("write", &temp))?;
    std::fs::rename(&temp, path).map_err(StorageError::io("rename", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path() {
        let temp = temp_path(Path::new("/var/lib/xhub/xht_autobackup.txt"));
        assert_eq!(temp, PathBuf::from("/var/lib/xhub/xht_autobackup.txt.tmp"));
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.txt");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_io_error_display() {
        let err = StorageError::io("read", Path::new("missing.txt"))(io::Error::new(
            io::ErrorKind::NotFound,
            "not found",
        ));
        assert!(err.to_string().contains("read"));
        assert!(err.to_string().contains("missing.txt"));
    }
}
