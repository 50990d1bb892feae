//! Blob storage seam for the session registry
//!
//! The registry persists its whole session map as one serialized JSON blob
//! under a single fixed key. This module provides the storage seam and its
//! two implementations: a JSON file per key in a user-visible directory
//! (the production layout), and an in-memory map for tests.

use crate::error::{Result, RetraceError};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Environment variable overriding the session store directory
///
/// Takes precedence over both the configured path and the platform data
/// directory, which makes it easy to point tests or alternate profiles at a
/// scratch location.
pub const STORE_DIR_ENV: &str = "RETRACE_SESSION_STORE";

/// Unversioned, untransacted key-value storage for serialized blobs
///
/// The store offers no atomicity across read-modify-write cycles; concurrent
/// writers to the same key race with last-write-wins semantics.
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous blob
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the blob under `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed blob store: one JSON file per key
///
/// Files live in a directory directly visible to the user's environment, so
/// external tools (or the user) may read or clobber them at any time. The
/// registry is written to tolerate that.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store in the default location
    ///
    /// Resolution order: the [`STORE_DIR_ENV`] environment variable, then
    /// `path_override` (typically from configuration), then the platform
    /// data directory.
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Storage` if no directory can be determined or
    /// created.
    pub fn new(path_override: Option<&str>) -> Result<Self> {
        if let Ok(env_dir) = std::env::var(STORE_DIR_ENV) {
            return Self::with_dir(env_dir);
        }
        if let Some(dir) = path_override {
            return Self::with_dir(dir);
        }

        let proj_dirs = ProjectDirs::from("io", "retrace", "retrace")
            .ok_or_else(|| RetraceError::Storage("Could not determine data directory".into()))?;
        Self::with_dir(proj_dirs.data_dir())
    }

    /// Create a store rooted at the given directory
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Storage` if the directory cannot be created.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            RetraceError::Storage(format!(
                "Failed to create store directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Directory this store reads and writes
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(RetraceError::Storage(format!("Failed to read {}: {}", path.display(), e))
                    .into())
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        std::fs::write(&path, value).map_err(|e| {
            RetraceError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RetraceError::Storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }
}

/// In-memory blob store for tests
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| RetraceError::Storage("Store mutex poisoned".into()))?;
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| RetraceError::Storage("Store mutex poisoned".into()))?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| RetraceError::Storage("Store mutex poisoned".into()))?;
        blobs.remove(key);
        Ok(())
    }
}
