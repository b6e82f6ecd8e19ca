//! Agora Storage - Snapshot persistence with JSON files

pub mod error;

pub use error::StorageError;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single JSON document on disk.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
pub struct StateFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(StorageError::InvalidPath(path.display().to_string()));
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the document, or `None` if it was never written.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        if !self.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&content)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        debug!(path = %self.path.display(), bytes = content.len(), "state loaded");
        Ok(Some(value))
    }

    /// Replace the document with `value`.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, &content)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), bytes = content.len(), "state saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
