//! Cache coordination.
//!
//! Two tiers: a bounded [`MemoryStore`] in front of a [`CacheBackend`]
//! that may be persistent. Values are serialized with `serde_json`; an
//! entry that fails to deserialize is a miss.
//!
//! Keys are blake3 digests over [`CACHE_VERSION`], the caller's
//! environment digest and the caller's parts. Dependency-tracked values
//! ([`CacheCoordinator::fetch_tracked`]) also keep a per-id history of the
//! dependency sets they were built from, so a later build can check the
//! live digests of those sets instead of rebuilding first.

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{CacheBackend, FileStore, NullStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::hash::{Digest, DigestBuilder};

/// Bumped whenever the stored layout changes.
pub const CACHE_VERSION: &str = "assetweave-cache-1";

/// Dependency sets remembered per id, most recent first.
const HISTORY_LIMIT: usize = 4;

/// Default in-memory capacity (entries).
pub const DEFAULT_MEMORY_ENTRIES: usize = 1024;

/// A dependency-tracked value with the digests it was built against.
#[derive(Serialize, Deserialize)]
struct Tracked<T> {
    dependencies: Vec<(String, Digest)>,
    value: T,
}

/// Hit and miss counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

pub struct CacheCoordinator {
    memory: MemoryStore,
    backend: Arc<dyn CacheBackend>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("memory_entries", &self.memory.len())
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_ENTRIES, Arc::new(NullStore))
    }
}

impl CacheCoordinator {
    pub fn new(memory_entries: usize, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            memory: MemoryStore::new(memory_entries),
            backend,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// A coordinator that never retains anything.
    pub fn disabled() -> Self {
        Self::new(0, Arc::new(NullStore))
    }

    /// Cache key for `parts` within environment `env`.
    pub fn key(&self, env: &Digest, parts: &[&str]) -> String {
        let mut b = DigestBuilder::new();
        b.part(CACHE_VERSION).digest(env);
        for part in parts {
            b.part(part);
        }
        b.finish().to_hex()
    }

    // ------------------------------------------------------------------------
    // Raw tiers
    // ------------------------------------------------------------------------

    pub fn get_bytes(&self, key: &str) -> Option<Arc<[u8]>> {
        if let Some(hit) = self.memory.get(key) {
            return Some(hit);
        }
        let bytes: Arc<[u8]> = self.backend.get(key)?.into();
        self.memory.set(key, Arc::clone(&bytes));
        Some(bytes)
    }

    pub fn set_bytes(&self, key: &str, value: Vec<u8>) {
        let stored = self.backend.set(key, value);
        self.memory.set(key, stored.into());
    }

    // ------------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------------

    /// Deserialized value under `key`; undecodable entries count as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get_bytes(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                crate::debug!("cache"; "discarding unreadable entry {}: {}", &key[..key.len().min(16)], e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set_bytes(key, bytes),
            Err(e) => crate::debug!("cache"; "cannot serialize entry: {}", e),
        }
    }

    /// Value under `key`, computing and storing it on a miss.
    pub fn fetch<T, F>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        self.set(key, &value);
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Dependency-tracked values
    // ------------------------------------------------------------------------

    /// Value for `id` whose validity depends on a set of dependency URIs.
    ///
    /// Each remembered dependency set for `id` is digested through `live`;
    /// an entry stored under those digests is returned only if the digests
    /// it recorded still match. Otherwise `compute` runs and returns the
    /// value together with the dependency URIs it used.
    pub fn fetch_tracked<T, L, F>(&self, env: &Digest, id: &str, mut live: L, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        L: FnMut(&str) -> Digest,
        F: FnOnce() -> Result<(T, IndexSet<String>)>,
    {
        let history_key = self.key(env, &["history", id]);
        let history: Vec<Vec<String>> = self.get(&history_key).unwrap_or_default();

        for deps in &history {
            let digests = digest_all(deps.iter(), &mut live);
            let key = self.entry_key(env, id, &digests);
            let Some(tracked) = self.get::<Tracked<T>>(&key) else {
                continue;
            };
            if tracked.dependencies == digests {
                self.hits.fetch_add(1, Ordering::Relaxed);
                crate::debug!("cache"; "hit {}", id);
                return Ok(tracked.value);
            }
            crate::debug!("cache"; "stale entry for {}", id);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::debug!("cache"; "miss {}", id);

        let (value, deps) = compute()?;
        let digests = digest_all(deps.iter(), &mut live);
        let tracked = Tracked {
            dependencies: digests,
            value,
        };
        let key = self.entry_key(env, id, &tracked.dependencies);
        self.set(&key, &tracked);

        let deps: Vec<String> = deps.into_iter().collect();
        let mut updated: Vec<Vec<String>> = history.into_iter().filter(|h| *h != deps).collect();
        updated.insert(0, deps);
        updated.truncate(HISTORY_LIMIT);
        self.set(&history_key, &updated);

        Ok(tracked.value)
    }

    fn entry_key(&self, env: &Digest, id: &str, digests: &[(String, Digest)]) -> String {
        let mut b = DigestBuilder::new();
        for (uri, digest) in digests {
            b.part(uri).digest(digest);
        }
        let combined = b.finish().to_hex();
        self.key(env, &["entry", id, &combined])
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop the in-memory tier. The backend is left alone.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }
}

fn digest_all<'a, I, L>(uris: I, live: &mut L) -> Vec<(String, Digest)>
where
    I: Iterator<Item = &'a String>,
    L: FnMut(&str) -> Digest,
{
    uris.map(|uri| (uri.clone(), live(uri))).collect()
}
