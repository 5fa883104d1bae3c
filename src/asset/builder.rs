//! From a resolved file to an [`Asset`].
//!
//! ```text
//! walk directives → per-file pipeline (cached) → concatenate
//!   → bundle processors → compressor
//! ```
//!
//! Whole bundles and single-file results are cached separately, both
//! through [`CacheCoordinator::fetch_tracked`](crate::cache::CacheCoordinator::fetch_tracked)
//! so that a hit costs a digest per dependency and no directive walk.

use std::fs;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::bundle::{Part, concatenate};
use super::{Asset, Body};
use crate::directive::walk;
use crate::environment::Index;
use crate::error::{AssetError, Result};
use crate::processor::metadata::{keys, set_of};
use crate::processor::{Input, MetaValue, Metadata, Processor};
use crate::resolver::SourceEntity;
use crate::sourcemap::{SourceMap, combine};
use crate::uri::{AssetUri, dependency, params};
use crate::utils::encoding::decode_text;
use crate::utils::mime::is_text;
use crate::utils::path::to_slash;

/// One file after its own pipeline, as cached under `pipeline=self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessedFile {
    part: Part,
    dependencies: IndexSet<String>,
    links: IndexSet<String>,
    charset: Option<String>,
}

/// Builds assets against one [`Index`].
pub struct AssetBuilder<'a> {
    index: &'a Index,
}

impl<'a> AssetBuilder<'a> {
    pub fn new(index: &'a Index) -> Self {
        Self { index }
    }

    /// The full bundle for `entity` delivered as `target`.
    pub fn build(&self, entity: &SourceEntity, target: &str) -> Result<Asset> {
        let id = entity.uri(target).build();
        self.index.cache().fetch_tracked(
            &self.index.digest(),
            &id,
            |dep| self.index.dependency_digest(dep),
            || {
                let asset = self.build_uncached(entity, target)?;
                let deps = asset.dependencies.clone();
                Ok((asset, deps))
            },
        )
    }

    /// `entity` through its own pipeline only, directives stripped but not
    /// expanded.
    pub fn build_self(&self, entity: &SourceEntity, target: &str) -> Result<Asset> {
        let processed = self.process_file(entity, target)?;
        let logical = self.logical_path_for(entity, target);
        let uri = entity.uri(target).with_param(params::PIPELINE, "self");

        let mut asset = Asset::new(
            uri.clone(),
            logical.clone(),
            target.to_string(),
            Body::Text(processed.part.data),
        );
        asset.constituents = vec![uri];
        asset.source_map = processed.part.map.with_file(logical);
        asset.dependencies = self_dependencies(entity, processed.dependencies);
        asset.links = processed.links;
        asset.mtime = entity.stat.mtime_secs();
        asset.charset = processed.charset;
        Ok(asset)
    }

    fn build_uncached(&self, entity: &SourceEntity, target: &str) -> Result<Asset> {
        if !is_text(&entity.content_type) {
            return self.build_binary(entity, target);
        }

        let plan = walk(self.index.resolver(), entity, target)?;
        let mut dependencies = plan.record.dependencies.clone();
        dependencies.insert(dependency::env_version());
        let mut links: IndexSet<String> = plan.record.linked.iter().map(AssetUri::build).collect();
        let mut charset = None;
        let mut mtime = 0;

        let mut parts = Vec::with_capacity(plan.files.len());
        for file in &plan.files {
            let processed = self.process_file(file, target)?;
            dependencies.extend(processed.dependencies);
            links.extend(processed.links);
            if charset.is_none() {
                charset = processed.charset;
            }
            mtime = mtime.max(file.stat.mtime_secs());
            parts.push(processed.part);
        }

        let logical = self.logical_path_for(entity, target);
        let (data, map) = concatenate(&parts, &self.index.options().separator);
        let (data, map, metadata) = self.run_bundle(entity, target, &logical, data, map)?;

        dependencies.extend(set_of(&metadata, keys::DEPENDENCIES).cloned());
        links.extend(set_of(&metadata, keys::LINKS).cloned());
        if let Some(value) = metadata.get(keys::CHARSET).and_then(MetaValue::as_str) {
            charset = Some(value.to_string());
        }

        let mut asset = Asset::new(
            entity.uri(target),
            logical.clone(),
            target.to_string(),
            Body::Text(data),
        );
        asset.constituents = plan.record.required.iter().cloned().collect();
        asset.source_map = map.with_file(logical);
        asset.dependencies = dependencies;
        asset.links = links;
        asset.mtime = mtime;
        asset.charset = charset;

        crate::debug!(
            "build";
            "{} ({} files, {} bytes)",
            asset.logical_path,
            asset.constituents.len(),
            asset.length
        );
        Ok(asset)
    }

    /// Non-text files are delivered byte for byte.
    fn build_binary(&self, entity: &SourceEntity, target: &str) -> Result<Asset> {
        if target != entity.content_type {
            return Err(AssetError::Conversion {
                from: entity.content_type.clone(),
                to: target.to_string(),
                path: entity.path.clone(),
            });
        }
        let bytes = fs::read(&entity.path).map_err(|e| AssetError::Io(entity.path.clone(), e))?;
        let uri = entity.uri(target);

        let mut asset = Asset::new(
            uri.clone(),
            entity.logical_path.clone(),
            target.to_string(),
            Body::Binary(bytes),
        );
        asset.constituents = vec![uri];
        asset.dependencies = self_dependencies(entity, IndexSet::new());
        asset.mtime = entity.stat.mtime_secs();
        Ok(asset)
    }

    fn process_file(&self, entity: &SourceEntity, target: &str) -> Result<ProcessedFile> {
        let uri = entity.uri(target).with_param(params::PIPELINE, "self");
        self.index.cache().fetch_tracked(
            &self.index.digest(),
            &uri.build(),
            |dep| self.index.dependency_digest(dep),
            || {
                let processed = self.process_uncached(entity, target, &uri)?;
                let deps = self_dependencies(entity, processed.dependencies.clone());
                Ok((processed, deps))
            },
        )
    }

    fn process_uncached(&self, entity: &SourceEntity, target: &str, uri: &AssetUri) -> Result<ProcessedFile> {
        let bytes = fs::read(&entity.path).map_err(|e| AssetError::Io(entity.path.clone(), e))?;
        let data = decode_text(bytes, &entity.path)?;

        let pipeline = self.index.resolver().registry().file_pipeline(
            &entity.source_type,
            &entity.engine_exts,
            &entity.content_type,
            target,
            &entity.path,
        )?;
        let source = entity
            .path
            .strip_prefix(&entity.root)
            .map(to_slash)
            .unwrap_or_else(|_| to_slash(&entity.path));

        let input = Input {
            data,
            content_type: entity.content_type.clone(),
            source_path: entity.path.clone(),
            logical_path: self.logical_path_for(entity, target),
            uri: uri.clone(),
            metadata: Metadata::new(),
            cache: Some(Arc::clone(self.index.cache())),
        };
        let (out, mut metadata) = pipeline.process(&input)?.into_parts();

        // stage maps are relative to the file's own text
        let map = match metadata.remove(keys::MAP) {
            Some(MetaValue::Map(map)) => combine(&SourceMap::identity(&source, &input.data), &map),
            _ => SourceMap::identity(&source, &out),
        };

        Ok(ProcessedFile {
            dependencies: set_of(&metadata, keys::DEPENDENCIES).cloned().collect(),
            links: set_of(&metadata, keys::LINKS).cloned().collect(),
            charset: metadata
                .get(keys::CHARSET)
                .and_then(MetaValue::as_str)
                .map(str::to_string),
            part: Part { data: out, map },
        })
    }

    /// Bundle processors, then the configured compressor.
    fn run_bundle(
        &self,
        entity: &SourceEntity,
        target: &str,
        logical: &str,
        data: String,
        map: SourceMap,
    ) -> Result<(String, SourceMap, Metadata)> {
        let compressor = self.index.options().compressors.get(target).map(String::as_str);
        let pipeline = self
            .index
            .resolver()
            .registry()
            .bundle_pipeline(target, compressor, &entity.path)?;
        if pipeline.is_empty() {
            return Ok((data, map, Metadata::new()));
        }

        let mut metadata = Metadata::new();
        metadata.insert(keys::MAP.into(), map.clone().into());
        let input = Input {
            data,
            content_type: target.to_string(),
            source_path: entity.path.clone(),
            logical_path: logical.to_string(),
            uri: entity.uri(target),
            metadata,
            cache: Some(Arc::clone(self.index.cache())),
        };
        let (out, mut produced) = pipeline.process(&input)?.into_parts();
        let map = match produced.remove(keys::MAP) {
            Some(MetaValue::Map(stage)) => combine(&map, &stage),
            _ => map,
        };
        Ok((out, map, produced))
    }

    /// Logical path of `entity` once delivered as `target`: `app.coffee`
    /// as JavaScript is `app.js`.
    fn logical_path_for(&self, entity: &SourceEntity, target: &str) -> String {
        if target == entity.content_type {
            return entity.logical_path.clone();
        }
        let ext = self
            .index
            .resolver()
            .registry()
            .extension_for(target)
            .unwrap_or_default();
        match entity.logical_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{}{ext}", entity.name),
            None => format!("{}{ext}", entity.name),
        }
    }
}

/// What a single file's result depends on besides the processors' own
/// reports.
fn self_dependencies(entity: &SourceEntity, reported: IndexSet<String>) -> IndexSet<String> {
    let mut deps = IndexSet::with_capacity(reported.len() + 2);
    deps.insert(dependency::file_digest(&entity.path));
    deps.insert(dependency::env_version());
    deps.extend(reported);
    deps
}
