//! Uploaded module assets
//!
//! Assets are plain files in a single directory. Operators upload, download,
//! list and delete them; servers reference them by name as their module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{write_atomic, StorageError};

/// One uploaded asset
#[derive(Debug, Clone, Serialize)]
pub struct AssetEntry {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// Directory of uploaded module assets
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,

    /// File inside `dir` that holds descriptions and is not an asset
    reserved: String,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, reserved: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            reserved: reserved.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(StorageError::io("create_dir", &self.dir))
    }

    /// Path of asset `name`, if `name` is a plain file name
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        let is_plain = !name.is_empty()
            && name != self.reserved
            && !name.chars().any(char::is_control)
            && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        is_plain.then(|| self.dir.join(name))
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        self.path_of(name)
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))
    }

    /// Whether asset `name` is present on disk
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_some_and(|path| path.is_file())
    }

    /// Contents of asset `name`, or `None` if it is not there
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.checked_path(name)?;
        match std::fs::read(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io("read", &path)(e)),
        }
    }

    /// Store `contents` as asset `name`, replacing any previous version
    pub fn write(&self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        let path = self.checked_path(name)?;
        write_atomic(&path, contents)
    }

    /// Move asset `name` aside as `<YYYYMMDD_HHMMSS>_<name>`.
    /// Returns the new name, or `None` if there was nothing to move.
    pub fn back_up(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        let path = self.checked_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        let backup = format!("{}_{name}", now.format("%Y%m%d_%H%M%S"));
        let target = self.checked_path(&backup)?;
        std::fs::rename(&path, &target).map_err(StorageError::io("rename", &path))?;
        Ok(Some(backup))
    }

    /// Delete asset `name`. Returns `false` if it was not there.
    pub fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.checked_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io("remove", &path)(e)),
        }
    }

    /// All assets, newest first
    pub fn list(&self) -> Result<Vec<AssetEntry>, StorageError> {
        let mut entries = Vec::new();

        let dir = std::fs::read_dir(&self.dir).map_err(StorageError::io("read_dir", &self.dir))?;
        for entry in dir {
            let entry = entry.map_err(StorageError::io("read_dir", &self.dir))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name == self.reserved {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(StorageError::io("metadata", &entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(AssetEntry {
                name,
                modified,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AssetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path(), "xhub_descriptions.json");
        (dir, store)
    }

    #[test]
    fn test_exists_and_remove() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("app.jar"), b"jar").unwrap();

        assert!(store.exists("app.jar"));
        assert!(!store.exists("other.jar"));
        assert!(!store.exists(""));

        assert!(store.remove("app.jar").unwrap());
        assert!(!store.exists("app.jar"));
        assert!(!store.remove("app.jar").unwrap());
    }

    #[test]
    fn test_rejects_non_plain_names() {
        let (_dir, store) = store();
        assert!(store.path_of("../etc/passwd").is_none());
        assert!(store.path_of("nested/app.jar").is_none());
        assert!(store.path_of("xhub_descriptions.json").is_none());
        assert!(store.path_of("x\nD>injected").is_none());
        assert!(matches!(
            store.write("../escape.jar", b"x"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            store.remove("../x"),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_list_skips_reserved_file() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("a.jar"), b"a").unwrap();
        std::fs::write(dir.path().join("b.jar"), b"bb").unwrap();
        std::fs::write(dir.path().join("xhub_descriptions.json"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut names: Vec<_> = store.list().unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, vec!["a.jar", "b.jar"]);
    }

    #[test]
    fn test_write_and_read() {
        let (_dir, store) = store();
        assert_eq!(store.read("app.jar").unwrap(), None);

        store.write("app.jar", b"v1").unwrap();
        store.write("app.jar", b"v2").unwrap();

        assert_eq!(store.read("app.jar").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_back_up_moves_file_aside() {
        let (_dir, store) = store();
        let now = DateTime::parse_from_rfc3339("2026-03-01T08:09:10Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(store.back_up("app.jar", now).unwrap(), None);

        store.write("app.jar", b"v1").unwrap();
        let backup = store.back_up("app.jar", now).unwrap();

        assert_eq!(backup.as_deref(), Some("20260301_080910_app.jar"));
        assert!(!store.exists("app.jar"));
        assert_eq!(store.read("20260301_080910_app.jar").unwrap(), Some(b"v1".to_vec()));
    }
}
