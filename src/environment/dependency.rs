//! Live digests of dependency URIs.
//!
//! Content digests are memoized by stat digest and outlive a single
//! [`Index`](super::Index): a file whose stat changed but whose bytes did
//! not hashes to the same digest, and a file whose stat did not change is
//! never read again.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::resolver::StatCache;
use crate::uri::dependency::{self, Dependency};
use crate::utils::hash::Digest;

/// Content digests keyed by path, valid for one stat digest.
#[derive(Debug, Default)]
pub struct ContentDigests {
    entries: DashMap<PathBuf, (Digest, Digest)>,
}

impl ContentDigests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of the file's bytes, re-read only when `stat` differs from
    /// the one the memoized digest was computed for.
    pub fn get(&self, path: &Path, stat: Digest) -> Digest {
        if let Some(entry) = self.entries.get(path)
            && entry.0 == stat
        {
            return entry.1;
        }
        let content = hash_file(path);
        if !content.is_empty() {
            self.entries.insert(path.to_path_buf(), (stat, content));
        }
        content
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn hash_file(path: &Path) -> Digest {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return Digest::empty(),
    };

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Digest::empty(),
        }
    }

    Digest::new(*hasher.finalize().as_bytes())
}

/// Resolve dependency URIs to their current digests.
pub struct LiveDigests<'a> {
    pub stats: &'a StatCache,
    pub content: &'a ContentDigests,
    pub version: &'a Digest,
}

impl LiveDigests<'_> {
    /// Current digest of `uri`; absent files and unknown schemes give the
    /// empty digest.
    pub fn digest(&self, uri: &str) -> Digest {
        match dependency::parse(uri) {
            Some(Dependency::FileDigest(path)) => match self.stats.stat(&path) {
                Some(stat) if stat.is_file() => self.content.get(&path, stat.digest()),
                _ => Digest::empty(),
            },
            Some(Dependency::FileStat(path)) => self
                .stats
                .stat(&path)
                .map_or_else(Digest::empty, |stat| stat.digest()),
            Some(Dependency::DirListing(path)) => self.stats.listing_digest(&path),
            Some(Dependency::EnvVersion) => *self.version,
            None => {
                crate::debug!("deps"; "unknown dependency uri {}", uri);
                Digest::empty()
            }
        }
    }
}
