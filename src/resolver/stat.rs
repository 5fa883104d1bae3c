//! Per-build filesystem memo.
//!
//! Every path is stat'd at most once and every directory listed at most
//! once for the lifetime of a [`StatCache`]. The counters record real
//! filesystem calls so that callers can check the guarantee.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::utils::hash::{Digest, DigestBuilder};

/// The parts of a file's metadata used for staleness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime: u128,
    pub mode: u32,
    pub is_dir: bool,
}

impl FileStat {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos());
        Self {
            size: meta.len(),
            mtime,
            mode: mode_of(meta),
            is_dir: meta.is_dir(),
        }
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Digest over size, mtime and mode. Never reads content.
    pub fn digest(&self) -> Digest {
        DigestBuilder::new()
            .part(self.size.to_le_bytes())
            .part(self.mtime.to_le_bytes())
            .part(self.mode.to_le_bytes())
            .finish()
    }

    /// Modification time in whole seconds.
    pub fn mtime_secs(&self) -> u64 {
        (self.mtime / 1_000_000_000) as u64
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    u32::from(meta.permissions().readonly())
}

/// Memoized `stat` and `read_dir`.
#[derive(Debug, Default)]
pub struct StatCache {
    stats: DashMap<PathBuf, Option<FileStat>>,
    listings: DashMap<PathBuf, Option<Arc<[String]>>>,
    stat_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `path`, or `None` if it does not exist.
    pub fn stat(&self, path: &Path) -> Option<FileStat> {
        if let Some(hit) = self.stats.get(path) {
            return *hit;
        }
        *self
            .stats
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                self.stat_calls.fetch_add(1, Ordering::Relaxed);
                fs::metadata(path).ok().map(|m| FileStat::from_metadata(&m))
            })
            .value()
    }

    /// Sorted entry names of `dir`, or `None` if it is not a readable directory.
    pub fn entries(&self, dir: &Path) -> Option<Arc<[String]>> {
        if let Some(hit) = self.listings.get(dir) {
            return hit.clone();
        }
        self.listings
            .entry(dir.to_path_buf())
            .or_insert_with(|| {
                self.list_calls.fetch_add(1, Ordering::Relaxed);
                read_sorted(dir)
            })
            .value()
            .clone()
    }

    /// Digest of a directory's entry names (empty digest when absent).
    pub fn listing_digest(&self, dir: &Path) -> Digest {
        match self.entries(dir) {
            Some(names) => {
                let mut b = DigestBuilder::new();
                for name in names.iter() {
                    b.part(name);
                }
                b.finish()
            }
            None => Digest::empty(),
        }
    }

    /// Number of real `stat` calls made so far.
    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::Relaxed)
    }

    /// Number of real `read_dir` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }
}

fn read_sorted(dir: &Path) -> Option<Arc<[String]>> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort_unstable();
    Some(names.into())
}
