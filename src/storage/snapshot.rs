//! Crash-recovery snapshot
//!
//! After every exclusive access the coordinator hands the full template text
//! of the topology to this store. Snapshots carry a generation number taken
//! while the topology was locked; a snapshot older than the last one written
//! is discarded, so concurrent writers can never roll the file back.

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{temp_path, StorageError};

/// File-backed crash-recovery snapshot
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    last_written: Mutex<u64>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot text, if a snapshot exists
    pub fn load(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text =
            std::fs::read_to_string(&self.path).map_err(StorageError::io("read", &self.path))?;
        Ok(Some(text))
    }

    /// Persist `contents` taken at `generation`.
    ///
    /// Returns `Ok(false)` when a newer generation has already been written.
    pub async fn write(&self, generation: u64, contents: &str) -> Result<bool, StorageError> {
        let mut last = self.last_written.lock().await;
        if generation <= *last {
            return Ok(false);
        }

        let temp = temp_path(&self.path);
        tokio::fs::write(&temp, contents)
            .await
            .map_err(StorageError::io("write", &temp))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(StorageError::io("rename", &self.path))?;

        *last = generation;
        tracing::trace!(path = %self.path.display(), generation, "Snapshot saved");
        Ok(true)
    }
}
