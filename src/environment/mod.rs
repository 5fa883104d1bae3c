//! Configured builders.
//!
//! [`Environment`] is the mutable setup: roots, registry, version, cache and
//! build options. [`Environment::index`] takes an immutable [`Index`]
//! snapshot for one build or one batch. An index owns its own stat memo, so
//! every path is stat'd at most once while it lives, and it has no
//! mutators: changing the environment afterwards never reaches it.

mod dependency;

pub use dependency::{ContentDigests, LiveDigests};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use jwalk::WalkDir;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::asset::{Asset, AssetBuilder};
use crate::cache::{CacheBackend, CacheCoordinator, FileStore, NullStore};
use crate::config::AssetConfig;
use crate::error::{AssetError, Result};
use crate::processor::Registry;
use crate::resolver::{Resolved, Resolver, SourceEntity, StatCache, parse_name};
use crate::uri::AssetUri;
use crate::utils::hash::{Digest, DigestBuilder};
use crate::utils::mime::Accept;
use crate::utils::path::normalize_path;

/// Options that shape a bundle and therefore its cache key.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Inserted between concatenated files.
    pub separator: String,
    /// Compressor name per content type.
    pub compressors: FxHashMap<String, String>,
    /// Threads for [`Environment::build_all`].
    pub jobs: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            compressors: FxHashMap::default(),
            jobs: default_jobs(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZero::get)
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Clone)]
pub struct Environment {
    roots: Vec<PathBuf>,
    registry: Registry,
    version: String,
    options: BuildOptions,
    cache: Arc<CacheCoordinator>,
    content: Arc<ContentDigests>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("roots", &self.roots)
            .field("version", &self.version)
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// No roots, the default registry and an in-memory cache.
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            registry: Registry::default(),
            version: String::new(),
            options: BuildOptions::default(),
            cache: Arc::new(CacheCoordinator::default()),
            content: Arc::new(ContentDigests::new()),
        }
    }

    /// Environment described by a loaded config file.
    pub fn from_config(config: &AssetConfig) -> Self {
        let mut env = Self::new();
        for root in &config.paths.roots {
            env.append_path(root);
        }
        env.set_version(config.build.version.clone());
        env.set_separator(config.build.separator.clone());
        if config.build.jobs > 0 {
            env.set_jobs(config.build.jobs);
        }
        for (content_type, name) in config.build.compress.by_content_type() {
            env.set_compressor(&content_type, Some(&name));
        }

        let cache = if config.cache.enabled {
            let backend: Arc<dyn CacheBackend> = Arc::new(FileStore::new(&config.cache.dir));
            CacheCoordinator::new(config.cache.memory_entries, backend)
        } else {
            CacheCoordinator::new(0, Arc::new(NullStore))
        };
        env.set_cache(Arc::new(cache));
        env
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Add a root searched after the existing ones.
    pub fn append_path(&mut self, path: impl AsRef<Path>) {
        let path = normalize_path(path.as_ref());
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
    }

    /// Add a root searched before the existing ones.
    pub fn prepend_path(&mut self, path: impl AsRef<Path>) {
        let path = normalize_path(path.as_ref());
        self.roots.retain(|r| *r != path);
        self.roots.insert(0, path);
    }

    pub fn clear_paths(&mut self) {
        self.roots.clear();
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registrations made here shadow the shared defaults.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Changing the version invalidates every cached result built under
    /// the old one; setting it back makes them valid again.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn set_separator(&mut self, separator: impl Into<String>) {
        self.options.separator = separator.into();
    }

    /// Select the bundle compressor for a content type, `None` to disable.
    pub fn set_compressor(&mut self, content_type: &str, name: Option<&str>) {
        match name {
            Some(name) => {
                self.options
                    .compressors
                    .insert(content_type.to_string(), name.to_string());
            }
            None => {
                self.options.compressors.remove(content_type);
            }
        }
    }

    pub fn set_jobs(&mut self, jobs: usize) {
        self.options.jobs = jobs.max(1);
    }

    pub fn cache(&self) -> &Arc<CacheCoordinator> {
        &self.cache
    }

    pub fn set_cache(&mut self, cache: Arc<CacheCoordinator>) {
        self.cache = cache;
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Digest of everything that shapes every build: roots, version,
    /// registrations and bundle options.
    pub fn digest(&self) -> Digest {
        environment_digest(&self.roots, &self.version, &self.registry, &self.options)
    }

    /// Immutable snapshot for one build or batch.
    pub fn index(&self) -> Index {
        Index::new(self)
    }

    pub fn find_asset(&self, logical: &str, accept: &Accept) -> Result<Asset> {
        self.index().find_asset(logical, accept)
    }

    /// Build every logical path on a pool of [`BuildOptions::jobs`] threads
    /// sharing one index. The first error aborts the batch.
    pub fn build_all<S>(&self, logical_paths: &[S]) -> Result<Vec<Asset>>
    where
        S: AsRef<str> + Sync,
    {
        let index = self.index();
        let run = || {
            logical_paths
                .par_iter()
                .map(|logical| index.find_asset(logical.as_ref(), &Accept::any()))
                .collect::<Result<Vec<_>>>()
        };

        let assets = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                crate::log!("build"; "thread pool unavailable ({e}), using the global pool");
                run()
            }
        }?;

        crate::debug!("build"; "built {} assets", assets.len());
        Ok(assets)
    }

    /// Every logical path under the roots, sorted. The first root wins when
    /// several hold the same logical path.
    pub fn logical_paths(&self) -> Vec<String> {
        let index = self.index();
        let mut seen = IndexSet::new();

        for root in &self.roots {
            let mut files: Vec<PathBuf> = WalkDir::new(root)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path())
                .collect();
            files.sort();

            for path in files {
                if let Some(entity) = index.resolver().entity_at(&path) {
                    seen.insert(entity.logical_path);
                }
            }
        }

        let mut paths: Vec<String> = seen.into_iter().collect();
        paths.sort();
        paths
    }
}

fn environment_digest(
    roots: &[PathBuf],
    version: &str,
    registry: &Registry,
    options: &BuildOptions,
) -> Digest {
    let mut b = DigestBuilder::new();
    b.part("roots");
    for root in roots {
        b.part(root.to_string_lossy().as_bytes());
    }
    b.part("version").part(version);
    b.digest(&registry.freeze().identity());
    b.part("separator").part(&options.separator);

    let mut compressors: Vec<_> = options.compressors.iter().collect();
    compressors.sort();
    b.part("compressors");
    for (content_type, name) in compressors {
        b.part(content_type).part(name);
    }
    b.finish()
}

// ============================================================================
// Index
// ============================================================================

/// Immutable per-build snapshot of an [`Environment`].
///
/// Cheap to clone; clones share the stat memo.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

struct IndexInner {
    resolver: Resolver,
    digest: Digest,
    version: Digest,
    options: BuildOptions,
    cache: Arc<CacheCoordinator>,
    content: Arc<ContentDigests>,
}

impl Index {
    fn new(env: &Environment) -> Self {
        let registry = env.registry.freeze();
        let resolver = Resolver::new(
            env.roots.clone().into(),
            registry,
            Arc::new(StatCache::new()),
        );
        Self {
            inner: Arc::new(IndexInner {
                resolver,
                digest: env.digest(),
                version: Digest::of(&env.version),
                options: env.options.clone(),
                cache: Arc::clone(&env.cache),
                content: Arc::clone(&env.content),
            }),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn stats(&self) -> &StatCache {
        self.inner.resolver.stats()
    }

    /// Environment digest this index was taken with.
    pub fn digest(&self) -> Digest {
        self.inner.digest
    }

    pub fn options(&self) -> &BuildOptions {
        &self.inner.options
    }

    pub fn cache(&self) -> &Arc<CacheCoordinator> {
        &self.inner.cache
    }

    pub fn resolve(&self, logical: &str, accept: &Accept) -> Result<Resolved> {
        self.inner.resolver.resolve(logical, accept, None)
    }

    /// Resolve `logical` and build it.
    pub fn find_asset(&self, logical: &str, accept: &Accept) -> Result<Asset> {
        let resolved = self.resolve(logical, accept)?;
        let target = self.target_type(logical, accept, &resolved.entity);
        AssetBuilder::new(self).build(&resolved.entity, &target)
    }

    /// Build the asset named by a URI; `pipeline=self` builds the file alone.
    pub fn load(&self, uri: &str) -> Result<Asset> {
        let uri = AssetUri::parse(uri)?;
        let path = uri.to_path_buf();
        let entity = self.inner.resolver.entity_at(&path).ok_or_else(|| {
            match self.inner.resolver.root_of(&path) {
                Some(_) => AssetError::not_found(uri.path()),
                None => AssetError::FileOutsidePaths {
                    path: path.clone(),
                    roots: self.inner.resolver.roots().to_vec(),
                },
            }
        })?;
        let target = uri
            .content_type()
            .unwrap_or(&entity.content_type)
            .to_string();

        let builder = AssetBuilder::new(self);
        if uri.is_self_pipeline() {
            builder.build_self(&entity, &target)
        } else {
            builder.build(&entity, &target)
        }
    }

    /// Current digest of a dependency URI.
    pub fn dependency_digest(&self, uri: &str) -> Digest {
        LiveDigests {
            stats: self.stats(),
            content: &self.inner.content,
            version: &self.inner.version,
        }
        .digest(uri)
    }

    /// Type to deliver: the request's own format extension if the file
    /// converts to it, else the first concrete accepted type it converts
    /// to, else the file's type.
    fn target_type(&self, logical: &str, accept: &Accept, entity: &SourceEntity) -> String {
        let registry = self.inner.resolver.registry();
        let base = logical.rsplit('/').next().unwrap_or(logical);
        let requested = parse_name(base, registry).format_ext.and_then(|ext| {
            registry
                .format_type(&ext)
                .map(str::to_string)
        });

        requested
            .into_iter()
            .chain(
                accept
                    .entries()
                    .iter()
                    .filter(|e| !e.mime.contains('*'))
                    .map(|e| e.mime.clone()),
            )
            .find(|ct| registry.converts(&entity.content_type, ct))
            .unwrap_or_else(|| entity.content_type.clone())
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("roots", &self.inner.resolver.roots())
            .field("digest", &self.inner.digest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
