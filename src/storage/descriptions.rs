//! Asset descriptions store
//!
//! A JSON object mapping asset file names to operator-written descriptions.
//! It is persisted independently of the topology snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{write_atomic, StorageError};

/// JSON file holding asset descriptions
#[derive(Debug, Clone)]
pub struct DescriptionStore {
    path: PathBuf,
}

impl DescriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load descriptions; a missing or unreadable file yields an empty map
    pub fn load(&self) -> BTreeMap<String, String> {
        match self.try_load() {
            Ok(descriptions) => descriptions,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load descriptions, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn try_load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let blob = std::fs::read(&self.path).map_err(StorageError::io("read", &self.path))?;
        if blob.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&blob)?)
    }

    pub fn save(&self, descriptions: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let blob = serde_json::to_vec(descriptions)?;
        write_atomic(&self.path, &blob)?;
        tracing::debug!(path = %self.path.display(), count = descriptions.len(), "Descriptions saved");
        Ok(())
    }
}
