//! The directive walk.
//!
//! Starting from a root file, every file's header is parsed once and turned
//! into [`Step`]s; [`bundle_order`] does the ordering and cycle handling.
//! Stubs are applied after the walk so that a stub anywhere prunes its
//! whole require closure, wherever else it was reached from.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

use super::header::{self, Directive};
use super::order::{Step, bundle_order, tree_order};
use super::record::{DependedOn, DependencyRecord};
use crate::error::{AssetError, Result};
use crate::resolver::{Resolver, SourceEntity, parse_name};
use crate::uri::{AssetUri, dependency};
use crate::utils::encoding::decode_text;
use crate::utils::mime::{Accept, AcceptEntry};
use crate::utils::path::{clean_path, is_relative_arg};

/// Files to concatenate, in order, plus everything the walk touched.
#[derive(Debug, Clone)]
pub struct BundlePlan {
    pub files: Vec<SourceEntity>,
    pub record: DependencyRecord,
}

/// Expand `root`'s directives into a bundle plan for `content_type`.
pub fn walk(resolver: &Resolver, root: &SourceEntity, content_type: &str) -> Result<BundlePlan> {
    GraphBuilder {
        resolver,
        content_type,
        nodes: IndexMap::new(),
        stubs: IndexSet::new(),
        record: DependencyRecord::new(),
    }
    .run(root)
}

struct Node {
    entity: SourceEntity,
    steps: Option<Vec<Step<AssetUri>>>,
}

struct GraphBuilder<'a> {
    resolver: &'a Resolver,
    content_type: &'a str,
    /// Every file reached, keyed by its URI as the bundle type.
    nodes: IndexMap<AssetUri, Node>,
    stubs: IndexSet<AssetUri>,
    record: DependencyRecord,
}

impl GraphBuilder<'_> {
    fn run(mut self, root: &SourceEntity) -> Result<BundlePlan> {
        let root_uri = self.admit(root.clone());
        let order = bundle_order(root_uri, |uri| self.expand(uri))?;
        let pruned = self.pruned()?;

        let mut files = Vec::with_capacity(order.len());
        for uri in order {
            if pruned.contains(&uri) {
                crate::debug!("graph"; "stubbed {}", uri.path());
                continue;
            }
            if let Some(node) = self.nodes.get(&uri) {
                files.push(node.entity.clone());
            }
            self.record.required.insert(uri);
        }

        for node in self.nodes.values() {
            self.record.depend(dependency::file_digest(&node.entity.path));
        }
        self.record.stubbed = pruned;
        self.record.settle();

        crate::debug!(
            "graph";
            "{}: {} files, {} dependencies",
            root.logical_path,
            files.len(),
            self.record.dependencies.len()
        );
        Ok(BundlePlan {
            files,
            record: self.record,
        })
    }

    /// Union of every stub's require closure.
    fn pruned(&mut self) -> Result<IndexSet<AssetUri>> {
        let mut pruned = IndexSet::new();
        let mut next = 0;
        // expanding a stub can collect further stubs
        while let Some(stub) = self.stubs.get_index(next).cloned() {
            next += 1;
            if pruned.contains(&stub) {
                continue;
            }
            pruned.extend(bundle_order(stub, |uri| self.expand(uri))?);
        }
        Ok(pruned)
    }

    fn admit(&mut self, entity: SourceEntity) -> AssetUri {
        let uri = entity.uri(self.content_type);
        self.nodes
            .entry(uri.clone())
            .or_insert(Node { entity, steps: None });
        uri
    }

    fn expand(&mut self, uri: &AssetUri) -> Result<Vec<Step<AssetUri>>> {
        let entity = match self.nodes.get(uri) {
            Some(Node {
                steps: Some(steps), ..
            }) => return Ok(steps.clone()),
            Some(node) => node.entity.clone(),
            None => return Err(AssetError::not_found(uri.path())),
        };

        let mut steps = Vec::new();
        let mut self_line = None;
        for directive in self.directives_of(&entity)? {
            match directive.name.as_str() {
                "require" => {
                    let target = self.resolve_typed(&entity, &directive)?;
                    steps.push(Step::Child(self.admit(target)));
                }
                "require_self" => {
                    no_args(&entity, &directive)?;
                    if let Some(first) = self_line {
                        return Err(argument(
                            &entity,
                            &directive,
                            format!("may only be used once (first on line {first})"),
                        ));
                    }
                    self_line = Some(directive.line);
                    steps.push(Step::SelfBody);
                }
                "require_directory" | "require_tree" => {
                    let recursive = directive.name == "require_tree";
                    let (dir, _) = self.directory_args(&entity, &directive, 1)?;
                    for file in self.list(&dir, recursive) {
                        if self
                            .resolver
                            .registry()
                            .converts(&file.content_type, self.content_type)
                        {
                            steps.push(Step::Child(self.admit(file)));
                        } else {
                            crate::debug!("graph"; "{} skipped {}", directive.name, file.path.display());
                        }
                    }
                }
                "depend_on" => {
                    let target = self.resolve_any(&entity, &directive)?;
                    self.record.depend_on(DependedOn::Stat(target.path));
                }
                "depend_on_asset" => {
                    let target = self.resolve_any(&entity, &directive)?;
                    self.record.depend_on(DependedOn::Content(target.path));
                }
                "stub" => {
                    let target = self.resolve_typed(&entity, &directive)?;
                    let stub = self.admit(target);
                    self.stubs.insert(stub);
                }
                "link" => {
                    let target = self.resolve_any(&entity, &directive)?;
                    let uri = target.uri(&target.content_type);
                    self.record.linked.insert(uri);
                }
                "link_directory" | "link_tree" => {
                    let recursive = directive.name == "link_tree";
                    let (dir, filter) = self.directory_args(&entity, &directive, 2)?;
                    for file in self.list(&dir, recursive) {
                        let wanted = filter
                            .as_ref()
                            .is_none_or(|accept| accept.quality_of(&file.content_type).is_some());
                        if wanted {
                            self.record.linked.insert(file.uri(&file.content_type));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(node) = self.nodes.get_mut(uri) {
            node.steps = Some(steps.clone());
        }
        Ok(steps)
    }

    fn directives_of(&self, entity: &SourceEntity) -> Result<Vec<Directive>> {
        let Some(syntax) = self.resolver.registry().comment_syntax(&entity.source_type) else {
            return Ok(Vec::new());
        };
        let bytes = fs::read(&entity.path).map_err(|e| AssetError::Io(entity.path.clone(), e))?;
        let text = decode_text(bytes, &entity.path)?;
        Ok(header::parse(&text, syntax, &entity.path)?.directives)
    }

    // ------------------------------------------------------------------------
    // Argument resolution
    // ------------------------------------------------------------------------

    /// Resolve a `require`/`stub` target as the bundle type.
    ///
    /// A target that exists only as another type is a mismatch, not a miss.
    fn resolve_typed(&mut self, from: &SourceEntity, directive: &Directive) -> Result<SourceEntity> {
        let logical = one_arg(from, directive)?;
        let base = Some(from.dir());

        let candidates = self
            .resolver
            .resolve_all(logical, &Accept::only(self.content_type), base);
        self.record.depend_all(candidates.dependencies().iter().cloned());
        if let Some(entity) = candidates.first() {
            return Ok(entity.clone());
        }

        let others = self.resolver.resolve_all(logical, &Accept::any(), base);
        self.record.depend_all(others.dependencies().iter().cloned());
        if let Some(other) = others.first() {
            return Err(AssetError::ContentTypeMismatch {
                path: other.path.clone(),
                actual: other.content_type.clone(),
                expected: self.content_type.to_string(),
            });
        }
        Err(self.resolver.miss(&candidates).in_file(&from.path))
    }

    /// Resolve a target of any type.
    fn resolve_any(&mut self, from: &SourceEntity, directive: &Directive) -> Result<SourceEntity> {
        let logical = one_arg(from, directive)?;
        let resolved = self
            .resolver
            .resolve(logical, &Accept::any(), Some(from.dir()))
            .map_err(|e| e.in_file(&from.path))?;
        self.record.depend_all(resolved.dependencies);
        Ok(resolved.entity)
    }

    /// Directory argument of the tree directives, plus an optional type filter.
    ///
    /// The directory must be given relative to the requiring file (`.`,
    /// `./lib`, `../shared`) or as an absolute path, and must exist under a
    /// root.
    fn directory_args(
        &self,
        from: &SourceEntity,
        directive: &Directive,
        max_args: usize,
    ) -> Result<(PathBuf, Option<Accept>)> {
        let (arg, filter) = match directive.args.as_slice() {
            [arg] => (arg.as_str(), None),
            [arg, filter] if max_args >= 2 => (arg.as_str(), Some(self.type_filter(filter))),
            _ => return Err(arity(from, directive, max_args)),
        };

        let dir = if is_relative_arg(arg) {
            clean_path(&from.dir().join(arg))
        } else if Path::new(arg).is_absolute() {
            clean_path(Path::new(arg))
        } else {
            return Err(argument(
                from,
                directive,
                format!("argument must be a relative path, got '{arg}'"),
            ));
        };

        let stat = self.resolver.stats().stat(&dir);
        if self.resolver.root_of(&dir).is_none() && stat.is_some() {
            return Err(AssetError::FileOutsidePaths {
                path: dir,
                roots: self.resolver.roots().to_vec(),
            });
        }
        if !stat.is_some_and(|s| s.is_dir) || self.resolver.root_of(&dir).is_none() {
            return Err(argument(
                from,
                directive,
                format!("argument must be a directory, got '{arg}'"),
            ));
        }
        Ok((dir, filter))
    }

    /// `.png` or `image/png`.
    fn type_filter(&self, filter: &str) -> Accept {
        let mime = if filter.starts_with('.') {
            self.resolver.registry().format_type(filter).unwrap_or(filter)
        } else {
            filter
        };
        Accept::from(AcceptEntry::new(mime, 1.0))
    }

    /// Files under `dir` in tree order, recording each listed directory.
    fn list(&mut self, dir: &Path, recursive: bool) -> Vec<SourceEntity> {
        let resolver = self.resolver;
        let registry = resolver.registry();
        let stats = resolver.stats();
        let mut listed = Vec::new();

        let paths = tree_order(
            dir,
            recursive,
            |d| {
                listed.push(dependency::dir_listing(d));
                stats
                    .entries(d)
                    .map(|names| {
                        names
                            .iter()
                            .map(|name| {
                                let is_dir = stats.stat(&d.join(name)).is_some_and(|s| s.is_dir);
                                (name.clone(), is_dir)
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            },
            |name| parse_name(name, registry).name == "index",
        );

        self.record.depend_all(listed);
        paths.iter().filter_map(|p| resolver.entity_at(p)).collect()
    }
}

// ============================================================================
// Argument errors
// ============================================================================

fn argument(from: &SourceEntity, directive: &Directive, message: impl Into<String>) -> AssetError {
    AssetError::Argument {
        directive: directive.name.clone(),
        message: message.into(),
        file: from.path.clone(),
        line: directive.line,
    }
}

fn arity(from: &SourceEntity, directive: &Directive, max: usize) -> AssetError {
    let expected = if max == 1 { "one argument".to_string() } else { format!("1 to {max} arguments") };
    argument(
        from,
        directive,
        format!("expected {expected}, got {}", directive.args.len()),
    )
}

fn one_arg<'d>(from: &SourceEntity, directive: &'d Directive) -> Result<&'d str> {
    match directive.args.as_slice() {
        [arg] => Ok(arg.as_str()),
        _ => Err(arity(from, directive, 1)),
    }
}

fn no_args(from: &SourceEntity, directive: &Directive) -> Result<()> {
    if directive.args.is_empty() {
        Ok(())
    } else {
        Err(argument(from, directive, "takes no arguments"))
    }
}
