//! What a directive walk collected.
//!
//! Four disjoint categories:
//! - `required`: inlined into the bundle, in bundle order
//! - `stubbed`: treated as already present, pruned with their requires
//! - `linked`: referenced by the bundle but built separately
//! - `depended_on`: not part of the output, only part of its freshness
//!
//! Plus the dependency URIs that key the cached bundle.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::uri::{AssetUri, dependency};

/// A file that affects freshness without being inlined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DependedOn {
    /// Only the stat digest counts (`depend_on`).
    Stat(PathBuf),
    /// The content digest counts (`depend_on_asset`).
    Content(PathBuf),
}

impl DependedOn {
    pub fn path(&self) -> &Path {
        match self {
            Self::Stat(path) | Self::Content(path) => path,
        }
    }

    /// Dependency URI to validate this entry with.
    pub fn dependency_uri(&self) -> String {
        match self {
            Self::Stat(path) => dependency::file_stat(path),
            Self::Content(path) => dependency::file_digest(path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub required: IndexSet<AssetUri>,
    pub stubbed: IndexSet<AssetUri>,
    pub linked: IndexSet<AssetUri>,
    pub depended_on: IndexSet<DependedOn>,
    /// `file-digest://`, `file-stat://`, `dir-listing://` and `env-version:` URIs.
    pub dependencies: IndexSet<String>,
}

impl DependencyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depend(&mut self, uri: impl Into<String>) {
        self.dependencies.insert(uri.into());
    }

    pub fn depend_all<I, S>(&mut self, uris: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(uris.into_iter().map(Into::into));
    }

    pub fn depend_on(&mut self, entry: DependedOn) {
        self.dependencies.insert(entry.dependency_uri());
        self.depended_on.insert(entry);
    }

    /// Restore disjointness after the walk: stubs leave `required`,
    /// and anything inlined is no longer merely linked.
    pub fn settle(&mut self) {
        let stubbed = &self.stubbed;
        self.required.retain(|uri| !stubbed.contains(uri));
        let required = &self.required;
        self.linked.retain(|uri| !required.contains(uri));
    }

    /// Absolute paths of every required file, in bundle order.
    pub fn required_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.required.iter().map(AssetUri::to_path_buf)
    }
}
