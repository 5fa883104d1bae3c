//! Cache backends.
//!
//! A backend is a plain byte store that may lose entries at any time. The
//! coordinator treats every loss, eviction or unreadable entry as a miss.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::hash::Digest;

/// Pluggable key/value store behind the in-memory tier.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` and hand it back.
    fn set(&self, key: &str, value: Vec<u8>) -> Vec<u8>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Backend that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl CacheBackend for NullStore {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, value: Vec<u8>) -> Vec<u8> {
        value
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// One file per entry under a directory, sharded by the first two hex
/// characters of the key's digest.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never see a partial entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hex = Digest::of(key).to_hex();
        self.dir.join(&hex[..2]).join(format!("{}.cache", &hex[2..]))
    }

    fn write(&self, path: &Path, value: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    /// Remove every entry.
    pub fn clear(&self) -> io::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl CacheBackend for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(key)).ok()
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Vec<u8> {
        let path = self.entry_path(key);
        if let Err(e) = self.write(&path, &value) {
            crate::debug!("cache"; "failed to write {}: {}", path.display(), e);
        }
        value
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
