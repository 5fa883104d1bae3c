//! Processor and extension registry.
//!
//! [`DEFAULT_REGISTRY`] is built once and shared. A [`Registry`] starts as a
//! cheap handle onto those tables and copies them the first time it is
//! modified, so its own registrations shadow the defaults without touching
//! them. [`Registry::freeze`] hands out a [`FrozenRegistry`] snapshot that
//! has no mutating methods; later changes to the registry never reach an
//! already frozen snapshot.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::builtin::{CharsetNormalizer, DirectiveProcessor};
use super::compose::{Composed, compose};
use super::minify::{CssMinifier, JsMinifier};
use super::{Processor, ProcessorRef};
use crate::directive::header::CommentSyntax;
use crate::error::{AssetError, Result};
use crate::utils::hash::{Digest, DigestBuilder};
use crate::utils::mime::{DEFAULT_EXTENSIONS, types};

/// A compiler/template stage selected by file extension.
#[derive(Clone)]
pub struct Engine {
    pub processor: ProcessorRef,
    /// Type of the raw file (`text/coffeescript`).
    pub source_type: String,
    /// Type produced when no format extension follows (`app.coffee` → JS).
    pub output: Option<String>,
}

#[derive(Clone, Default)]
struct Tables {
    formats: IndexMap<String, String>,
    engines: FxHashMap<String, Engine>,
    transformers: FxHashMap<(String, String), Vec<ProcessorRef>>,
    preprocessors: FxHashMap<String, Vec<ProcessorRef>>,
    postprocessors: FxHashMap<String, Vec<ProcessorRef>>,
    bundle_processors: FxHashMap<String, Vec<ProcessorRef>>,
    compressors: FxHashMap<String, IndexMap<String, ProcessorRef>>,
    comment_syntax: FxHashMap<String, CommentSyntax>,
}

/// Registry shared by every environment unless it registers its own stages.
pub static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_defaults);

/// Mutable, copy-on-write registry.
#[derive(Clone)]
pub struct Registry {
    tables: Arc<Tables>,
}

impl Default for Registry {
    fn default() -> Self {
        DEFAULT_REGISTRY.clone()
    }
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            tables: Arc::new(Tables::default()),
        }
    }

    fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (ext, mime) in DEFAULT_EXTENSIONS {
            registry.register_mime(ext, mime);
        }
        registry.register_directive_syntax(types::JAVASCRIPT, CommentSyntax::c_like());
        registry.register_directive_syntax(types::CSS, CommentSyntax::c_like());
        registry.register_bundle_processor(types::CSS, Arc::new(CharsetNormalizer));
        registry.register_compressor(types::JAVASCRIPT, "oxc", Arc::new(JsMinifier));
        registry.register_compressor(types::CSS, "lightningcss", Arc::new(CssMinifier));
        registry
    }

    fn tables(&mut self) -> &mut Tables {
        Arc::make_mut(&mut self.tables)
    }

    /// Whether this registry still shares the default tables.
    pub fn is_default(&self) -> bool {
        Arc::ptr_eq(&self.tables, &DEFAULT_REGISTRY.tables)
    }

    /// Map a format extension (`.js`) to a content type.
    pub fn register_mime(&mut self, ext: &str, content_type: &str) {
        self.tables()
            .formats
            .insert(ext.to_string(), content_type.to_string());
    }

    /// Register an engine for an extension (`.coffee`).
    pub fn register_engine(
        &mut self,
        ext: &str,
        source_type: &str,
        processor: ProcessorRef,
        output: Option<&str>,
    ) {
        self.tables().engines.insert(
            ext.to_string(),
            Engine {
                processor,
                source_type: source_type.to_string(),
                output: output.map(str::to_string),
            },
        );
    }

    /// Register a conversion from one content type to another.
    pub fn register_transformer(&mut self, from: &str, to: &str, processor: ProcessorRef) {
        self.tables()
            .transformers
            .entry((from.to_string(), to.to_string()))
            .or_default()
            .push(processor);
    }

    pub fn register_preprocessor(&mut self, content_type: &str, processor: ProcessorRef) {
        push(&mut self.tables().preprocessors, content_type, processor);
    }

    pub fn register_postprocessor(&mut self, content_type: &str, processor: ProcessorRef) {
        push(&mut self.tables().postprocessors, content_type, processor);
    }

    pub fn register_bundle_processor(&mut self, content_type: &str, processor: ProcessorRef) {
        push(&mut self.tables().bundle_processors, content_type, processor);
    }

    /// Remove preprocessors named `name` for a content type.
    pub fn unregister_preprocessor(&mut self, content_type: &str, name: &str) {
        if let Some(list) = self.tables().preprocessors.get_mut(content_type) {
            list.retain(|p| p.name() != name);
        }
    }

    /// Remove bundle processors named `name` for a content type.
    pub fn unregister_bundle_processor(&mut self, content_type: &str, name: &str) {
        if let Some(list) = self.tables().bundle_processors.get_mut(content_type) {
            list.retain(|p| p.name() != name);
        }
    }

    /// Register a named compressor, selectable from configuration.
    pub fn register_compressor(&mut self, content_type: &str, name: &str, processor: ProcessorRef) {
        self.tables()
            .compressors
            .entry(content_type.to_string())
            .or_default()
            .insert(name.to_string(), processor);
    }

    /// Declare the header comment style for a source type and strip its
    /// directives with a [`DirectiveProcessor`] preprocessor.
    pub fn register_directive_syntax(&mut self, source_type: &str, syntax: CommentSyntax) {
        let tables = self.tables();
        tables
            .comment_syntax
            .insert(source_type.to_string(), syntax.clone());
        let list = tables
            .preprocessors
            .entry(source_type.to_string())
            .or_default();
        list.retain(|p| p.name() != "directives");
        list.insert(0, Arc::new(DirectiveProcessor::new(syntax)));
    }

    /// Immutable snapshot.
    pub fn freeze(&self) -> FrozenRegistry {
        FrozenRegistry {
            identity: identity_of(&self.tables),
            tables: Arc::clone(&self.tables),
        }
    }
}

fn push(map: &mut FxHashMap<String, Vec<ProcessorRef>>, key: &str, processor: ProcessorRef) {
    map.entry(key.to_string()).or_default().push(processor);
}

/// Digest of every registration, used in cache keys.
fn identity_of(tables: &Tables) -> Digest {
    fn stage(builder: &mut DigestBuilder, p: &ProcessorRef) {
        builder.part(p.name());
        p.cache_key().into_iter().for_each(|k| k.digest_into(builder));
    }
    fn sorted<K: Ord, V>(map: &FxHashMap<K, V>) -> Vec<(&K, &V)> {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    let mut b = DigestBuilder::new();
    b.part("formats");
    for (ext, ct) in &tables.formats {
        b.part(ext).part(ct);
    }
    b.part("engines");
    for (ext, engine) in sorted(&tables.engines) {
        b.part(ext).part(&engine.source_type).part(engine.output.as_deref().unwrap_or(""));
        stage(&mut b, &engine.processor);
    }
    b.part("transformers");
    for ((from, to), list) in sorted(&tables.transformers) {
        b.part(from).part(to);
        list.iter().for_each(|p| stage(&mut b, p));
    }
    for (label, table) in [
        ("preprocessors", &tables.preprocessors),
        ("postprocessors", &tables.postprocessors),
        ("bundle", &tables.bundle_processors),
    ] {
        b.part(label);
        for (ct, list) in sorted(table) {
            b.part(ct);
            list.iter().for_each(|p| stage(&mut b, p));
        }
    }
    b.part("compressors");
    for (ct, named) in sorted(&tables.compressors) {
        b.part(ct);
        for (name, p) in named {
            b.part(name);
            stage(&mut b, p);
        }
    }
    b.finish()
}

// ============================================================================
// Frozen snapshot
// ============================================================================

/// Read-only registry snapshot held by an index for one build.
#[derive(Clone)]
pub struct FrozenRegistry {
    tables: Arc<Tables>,
    identity: Digest,
}

impl FrozenRegistry {
    /// Digest of every registration.
    pub fn identity(&self) -> Digest {
        self.identity
    }

    pub fn format_type(&self, ext: &str) -> Option<&str> {
        self.tables.formats.get(ext).map(String::as_str)
    }

    /// First registered format extension for a content type.
    pub fn extension_for(&self, content_type: &str) -> Option<&str> {
        self.tables
            .formats
            .iter()
            .find(|(_, ct)| *ct == content_type)
            .map(|(ext, _)| ext.as_str())
    }

    pub fn engine(&self, ext: &str) -> Option<&Engine> {
        self.tables.engines.get(ext)
    }

    /// Header comment style for a source type.
    pub fn comment_syntax(&self, source_type: &str) -> Option<&CommentSyntax> {
        self.tables.comment_syntax.get(source_type)
    }

    /// Source types that some transformer converts into `target`.
    pub fn transformer_sources(&self, target: &str) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .tables
            .transformers
            .keys()
            .filter(|(_, to)| to == target)
            .map(|(from, _)| from.as_str())
            .collect();
        sources.sort_unstable();
        sources
    }

    /// Whether `from` can be delivered as `to`.
    pub fn converts(&self, from: &str, to: &str) -> bool {
        from == to
            || self
                .tables
                .transformers
                .contains_key(&(from.to_string(), to.to_string()))
    }

    fn list(map: &FxHashMap<String, Vec<ProcessorRef>>, key: &str) -> Vec<ProcessorRef> {
        map.get(key).cloned().unwrap_or_default()
    }

    /// Per-file chain: preprocessors, engines, transformer, postprocessors.
    ///
    /// `engine_exts` is in filename order; the rightmost engine runs first.
    pub fn file_pipeline(
        &self,
        source_type: &str,
        engine_exts: &[String],
        content_type: &str,
        target: &str,
        path: &Path,
    ) -> Result<Composed> {
        let mut stages = Self::list(&self.tables.preprocessors, source_type);

        for ext in engine_exts.iter().rev() {
            if let Some(engine) = self.engine(ext) {
                stages.push(Arc::clone(&engine.processor));
            }
        }

        if content_type != target {
            let key = (content_type.to_string(), target.to_string());
            let transformers = self.tables.transformers.get(&key).ok_or_else(|| {
                AssetError::Conversion {
                    from: content_type.to_string(),
                    to: target.to_string(),
                    path: path.to_path_buf(),
                }
            })?;
            stages.extend(transformers.iter().cloned());
        }

        stages.extend(Self::list(&self.tables.postprocessors, target));
        Ok(compose(stages))
    }

    /// Bundle chain: bundle processors, then the named compressor if any.
    pub fn bundle_pipeline(
        &self,
        content_type: &str,
        compressor: Option<&str>,
        path: &Path,
    ) -> Result<Composed> {
        let mut stages = Self::list(&self.tables.bundle_processors, content_type);
        if let Some(name) = compressor {
            let found = self
                .tables
                .compressors
                .get(content_type)
                .and_then(|named| named.get(name))
                .ok_or_else(|| AssetError::Processor {
                    processor: name.to_string(),
                    path: path.to_path_buf(),
                    message: format!("no compressor '{name}' registered for '{content_type}'"),
                })?;
            stages.push(Arc::clone(found));
        }
        Ok(compose(stages))
    }
}
