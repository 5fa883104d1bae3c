//! Logical path resolution.
//!
//! A request such as `app.js`, `jquery`, `./lib/util` or an absolute path is
//! matched against each root in order:
//!
//! 1. exact file name (`app.js`)
//! 2. extension stripping (`app.js` → `app.js.coffee`, `app.coffee`)
//! 3. directory index (`app/index.js`)
//! 4. `package.json` `main` field (`app/package.json`)
//!
//! Candidates are ranked by accept quality, then root order, then match
//! kind, then file name. A trailing format extension on the request narrows
//! the accept list to that type; transformer source types are accepted at
//! reduced quality.

pub mod entity;
pub mod stat;

pub use entity::{ParsedName, SourceEntity, parse_name};
pub use stat::{FileStat, StatCache};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::{AssetError, Result};
use crate::processor::FrozenRegistry;
use crate::uri::dependency;
use crate::utils::mime::{Accept, AcceptEntry};
use crate::utils::path::{clean_path, is_relative_arg, is_within, to_slash};

/// Quality factor applied to types that need a transformer to be served.
const TRANSFORM_QUALITY: f32 = 0.8;

/// How a candidate matched, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Extension,
    Index,
    Package,
}

#[derive(Debug, Clone)]
struct Candidate {
    entity: SourceEntity,
    quality: f32,
    root_index: usize,
    kind: MatchKind,
}

/// All matches for one request, best first.
///
/// Iterating does not consume it; every iteration yields the same sequence.
#[derive(Debug, Clone)]
pub struct Candidates {
    request: String,
    items: Arc<[SourceEntity]>,
    dependencies: IndexSet<String>,
    outside: Option<PathBuf>,
}

impl Candidates {
    pub fn iter(&self) -> std::slice::Iter<'_, SourceEntity> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&SourceEntity> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Directories consulted while searching, as `dir-listing://` URIs.
    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    /// An existing file the request pointed at outside every root.
    pub fn outside(&self) -> Option<&Path> {
        self.outside.as_deref()
    }
}

impl<'a> IntoIterator for &'a Candidates {
    type Item = &'a SourceEntity;
    type IntoIter = std::slice::Iter<'a, SourceEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The winning candidate plus what the search looked at.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub entity: SourceEntity,
    pub dependencies: IndexSet<String>,
}

/// Resolver over ordered roots, a frozen registry and a stat memo.
#[derive(Clone)]
pub struct Resolver {
    roots: Arc<[PathBuf]>,
    registry: FrozenRegistry,
    stats: Arc<StatCache>,
}

impl Resolver {
    pub fn new(roots: Arc<[PathBuf]>, registry: FrozenRegistry, stats: Arc<StatCache>) -> Self {
        Self {
            roots,
            registry,
            stats,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn registry(&self) -> &FrozenRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &StatCache {
        &self.stats
    }

    /// Best match for `logical`, or an error.
    ///
    /// `base` is the directory of the requesting file for `./` and `../`
    /// requests.
    pub fn resolve(&self, logical: &str, accept: &Accept, base: Option<&Path>) -> Result<Resolved> {
        let candidates = self.resolve_all(logical, accept, base);
        let Some(entity) = candidates.first().cloned() else {
            return Err(self.miss(&candidates));
        };
        crate::debug!("resolve"; "{} -> {}", logical, entity.path.display());
        Ok(Resolved {
            entity,
            dependencies: candidates.dependencies,
        })
    }

    /// Error for a request with no candidates.
    pub fn miss(&self, candidates: &Candidates) -> AssetError {
        match candidates.outside() {
            Some(path) => AssetError::FileOutsidePaths {
                path: path.to_path_buf(),
                roots: self.roots.to_vec(),
            },
            None => AssetError::not_found(candidates.request.clone()),
        }
    }

    /// Every match for `logical`, best first.
    pub fn resolve_all(&self, logical: &str, accept: &Accept, base: Option<&Path>) -> Candidates {
        let mut search = Search {
            resolver: self,
            found: Vec::new(),
            dependencies: IndexSet::new(),
            outside: None,
        };

        let target = Path::new(logical);
        if target.is_absolute() {
            search.anchored(&clean_path(target), accept);
        } else if let Some(base) = base.filter(|_| is_relative_arg(logical)) {
            search.anchored(&clean_path(&base.join(logical)), accept);
        } else {
            for (idx, root) in self.roots.iter().enumerate() {
                search.in_root(idx, root, logical, accept);
            }
        }

        let Search {
            mut found,
            dependencies,
            mut outside,
            ..
        } = search;

        found.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then(a.root_index.cmp(&b.root_index))
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.entity.path.file_name().cmp(&b.entity.path.file_name()))
        });
        let mut seen = IndexSet::new();
        found.retain(|c| seen.insert(c.entity.path.clone()));
        if !found.is_empty() {
            outside = None;
        }

        Candidates {
            request: logical.to_string(),
            items: found.into_iter().map(|c| c.entity).collect(),
            dependencies,
            outside,
        }
    }

    /// Entity for an absolute file path under one of the roots.
    pub fn entity_at(&self, path: &Path) -> Option<SourceEntity> {
        let root = self.root_of(path)?;
        let stat = self.stats.stat(path).filter(FileStat::is_file)?;
        Some(SourceEntity::new(root, path, stat, &self.registry))
    }

    /// First root containing `path`.
    pub fn root_of(&self, path: &Path) -> Option<&PathBuf> {
        self.roots.iter().find(|root| is_within(path, root))
    }

    /// Accept list for a request, narrowed by its format extension and
    /// widened with transformer sources.
    fn effective_accept(&self, base_name: &str, accept: &Accept) -> Option<(String, Accept)> {
        let parsed = parse_name(base_name, &self.registry);
        let (stem, mut effective) = match parsed.format_ext.as_deref() {
            Some(ext) if parsed.engine_exts.is_empty() => {
                let narrowed = self.registry.format_type(ext).unwrap_or_default();
                let quality = accept.quality_of(narrowed)?;
                (parsed.name, Accept::from(AcceptEntry::new(narrowed, quality)))
            }
            _ => (base_name.to_string(), accept.clone()),
        };

        let concrete: Vec<AcceptEntry> = effective
            .entries()
            .iter()
            .filter(|e| !e.mime.contains('*'))
            .cloned()
            .collect();
        for entry in concrete {
            for source in self.registry.transformer_sources(&entry.mime) {
                effective.push(AcceptEntry::new(source, entry.quality * TRANSFORM_QUALITY));
            }
        }
        Some((stem, effective))
    }
}

/// Accumulator for one `resolve_all` call.
struct Search<'a> {
    resolver: &'a Resolver,
    found: Vec<Candidate>,
    dependencies: IndexSet<String>,
    outside: Option<PathBuf>,
}

impl Search<'_> {
    /// Search for a cleaned absolute path in the root that contains it.
    fn anchored(&mut self, path: &Path, accept: &Accept) {
        let resolver = self.resolver;
        let position = resolver.roots.iter().position(|root| is_within(path, root));
        match position {
            Some(idx) => {
                let root = &resolver.roots[idx];
                let rel = path.strip_prefix(root).map(to_slash).unwrap_or_default();
                if !rel.is_empty() {
                    self.in_root(idx, root, &rel, accept);
                }
            }
            None => self.note_outside(path),
        }
    }

    fn note_outside(&mut self, path: &Path) {
        if self.outside.is_none() && self.resolver.stats.stat(path).is_some() {
            self.outside = Some(path.to_path_buf());
        }
    }

    fn in_root(&mut self, root_index: usize, root: &Path, logical: &str, accept: &Accept) {
        let resolver = self.resolver;
        let (dir_part, base) = logical.rsplit_once('/').unwrap_or(("", logical));
        let dir = clean_path(&root.join(dir_part));
        if !is_within(&dir, root) {
            self.note_outside(&clean_path(&root.join(logical)));
            return;
        }
        let Some((stem, accept)) = resolver.effective_accept(base, accept) else {
            return;
        };

        self.dependencies.insert(dependency::dir_listing(&dir));
        let Some(entries) = resolver.stats.entries(&dir) else {
            return;
        };

        for name in entries.iter() {
            let path = dir.join(name);
            let Some(stat) = resolver.stats.stat(&path) else {
                continue;
            };

            if stat.is_dir {
                if name == base || *name == stem {
                    self.in_directory(root_index, root, &path, &accept);
                }
                continue;
            }

            let kind = if name == base {
                MatchKind::Exact
            } else if parse_name(name, &resolver.registry).name == stem {
                MatchKind::Extension
            } else {
                continue;
            };
            self.offer(root_index, root, &path, stat, kind, &accept);
        }
    }

    /// `dir/index.*` and `dir/package.json`.
    fn in_directory(&mut self, root_index: usize, root: &Path, dir: &Path, accept: &Accept) {
        let resolver = self.resolver;
        self.dependencies.insert(dependency::dir_listing(dir));
        let Some(entries) = resolver.stats.entries(dir) else {
            return;
        };

        for name in entries.iter() {
            let path = dir.join(name);
            let Some(stat) = resolver.stats.stat(&path).filter(FileStat::is_file) else {
                continue;
            };
            if name == "package.json" {
                if let Some(main) = package_main(&path, dir)
                    && is_within(&main, root)
                    && let Some(main_stat) = resolver.stats.stat(&main).filter(FileStat::is_file)
                {
                    self.offer(root_index, root, &main, main_stat, MatchKind::Package, accept);
                }
            } else if parse_name(name, &resolver.registry).name == "index" {
                self.offer(root_index, root, &path, stat, MatchKind::Index, accept);
            }
        }
    }

    fn offer(
        &mut self,
        root_index: usize,
        root: &Path,
        path: &Path,
        stat: FileStat,
        kind: MatchKind,
        accept: &Accept,
    ) {
        let entity = SourceEntity::new(root, path, stat, &self.resolver.registry);
        if let Some(quality) = accept.quality_of(&entity.content_type) {
            self.found.push(Candidate {
                entity,
                quality,
                root_index,
                kind,
            });
        }
    }
}

/// `main` entry of a `package.json`, resolved against its directory.
fn package_main(manifest: &Path, dir: &Path) -> Option<PathBuf> {
    let text = std::fs::read_to_string(manifest).ok()?;
    let json: serde_json::Value = serde_json::from_str(&text).ok()?;
    let main = json.get("main")?.as_str()?;
    Some(clean_path(&dir.join(main)))
}

#[cfg(test)]
mod tests;
