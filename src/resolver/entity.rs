//! Resolved source files.

use std::path::{Path, PathBuf};

use crate::processor::FrozenRegistry;
use crate::resolver::stat::FileStat;
use crate::uri::AssetUri;
use crate::utils::hash::Digest;
use crate::utils::mime::types;
use crate::utils::path::to_slash;

/// File name split into base name and extension chain.
///
/// `app.js.coffee` → name `app`, format `.js`, engines `[.coffee]`.
/// `jquery.min.js` → name `jquery.min`, format `.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub name: String,
    pub format_ext: Option<String>,
    /// Engine extensions in filename order.
    pub engine_exts: Vec<String>,
    /// Delivered type; `None` when nothing about the name is registered.
    pub content_type: Option<String>,
    /// Type of the raw bytes before any engine runs.
    pub source_type: Option<String>,
}

/// Split a file name against the registered format and engine extensions.
pub fn parse_name(file_name: &str, registry: &FrozenRegistry) -> ParsedName {
    let (hidden, body) = match file_name.strip_prefix('.') {
        Some(rest) => (".", rest),
        None => ("", file_name),
    };
    let mut parts: Vec<&str> = body.split('.').collect();
    let base = parts.remove(0);

    let mut engine_exts = Vec::new();
    while let Some(last) = parts.last() {
        let ext = format!(".{last}");
        if registry.engine(&ext).is_none() {
            break;
        }
        engine_exts.insert(0, ext);
        parts.pop();
    }

    let format_ext = parts
        .last()
        .map(|last| format!(".{last}"))
        .filter(|ext| registry.format_type(ext).is_some());
    if format_ext.is_some() {
        parts.pop();
    }

    let content_type = format_ext
        .as_deref()
        .and_then(|ext| registry.format_type(ext))
        .or_else(|| {
            engine_exts
                .first()
                .and_then(|ext| registry.engine(ext))
                .and_then(|engine| engine.output.as_deref())
        })
        .map(str::to_string);

    let source_type = engine_exts
        .last()
        .and_then(|ext| registry.engine(ext))
        .map(|engine| engine.source_type.clone())
        .or_else(|| content_type.clone());

    let mut name = format!("{hidden}{base}");
    for part in parts {
        name.push('.');
        name.push_str(part);
    }

    ParsedName {
        name,
        format_ext,
        engine_exts,
        content_type,
        source_type,
    }
}

/// A file found under one of the roots.
///
/// Produced fresh by every resolve; cheap to build from a memoized stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntity {
    pub root: PathBuf,
    pub path: PathBuf,
    /// Content-type-agnostic request name (`foo/index.js`).
    pub logical_path: String,
    /// Base name without extensions.
    pub name: String,
    pub engine_exts: Vec<String>,
    pub format_ext: Option<String>,
    pub content_type: String,
    pub source_type: String,
    pub stat: FileStat,
}

impl SourceEntity {
    /// Build the entity for `path` inside `root`.
    pub fn new(root: &Path, path: &Path, stat: FileStat, registry: &FrozenRegistry) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = parse_name(&file_name, registry);
        let content_type = parsed
            .content_type
            .unwrap_or_else(|| types::OCTET_STREAM.to_string());
        let source_type = parsed.source_type.unwrap_or_else(|| content_type.clone());

        let ext = parsed
            .format_ext
            .clone()
            .or_else(|| registry.extension_for(&content_type).map(str::to_string))
            .unwrap_or_default();
        let rel_dir = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(to_slash)
            .unwrap_or_default();
        let logical_path = if rel_dir.is_empty() {
            format!("{}{ext}", parsed.name)
        } else {
            format!("{rel_dir}/{}{ext}", parsed.name)
        };

        Self {
            root: root.to_path_buf(),
            path: path.to_path_buf(),
            logical_path,
            name: parsed.name,
            engine_exts: parsed.engine_exts,
            format_ext: parsed.format_ext,
            content_type,
            source_type,
            stat,
        }
    }

    pub fn stat_digest(&self) -> Digest {
        self.stat.digest()
    }

    pub fn is_index(&self) -> bool {
        self.name == "index"
    }

    /// Directory holding the file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.root)
    }

    /// Canonical URI for this file rendered as `content_type`.
    pub fn uri(&self, content_type: &str) -> AssetUri {
        AssetUri::new(&self.path, Some(content_type))
    }

    /// File name as it appears on disk.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{FnProcessor, Input, Output, Registry};
    use std::sync::Arc;

    fn registry() -> FrozenRegistry {
        let mut registry = Registry::default();
        let coffee = Arc::new(FnProcessor::new("coffee", |i: &Input| Ok(Output::Data(i.data.clone()))));
        registry.register_engine(".coffee", "text/coffeescript", coffee, Some(types::JAVASCRIPT));
        let erb = Arc::new(FnProcessor::new("erb", |i: &Input| Ok(Output::Data(i.data.clone()))));
        registry.register_engine(".erb", "text/x-erb", erb, None);
        registry.freeze()
    }

    #[test]
    fn test_parse_format_only() {
        let parsed = parse_name("jquery.min.js", &registry());
        assert_eq!(parsed.name, "jquery.min");
        assert_eq!(parsed.format_ext.as_deref(), Some(".js"));
        assert!(parsed.engine_exts.is_empty());
        assert_eq!(parsed.content_type.as_deref(), Some(types::JAVASCRIPT));
    }

    #[test]
    fn test_parse_engine_chain() {
        let parsed = parse_name("app.js.coffee.erb", &registry());
        assert_eq!(parsed.name, "app");
        assert_eq!(parsed.format_ext.as_deref(), Some(".js"));
        assert_eq!(parsed.engine_exts, [".coffee", ".erb"]);
        assert_eq!(parsed.content_type.as_deref(), Some(types::JAVASCRIPT));
        assert_eq!(parsed.source_type.as_deref(), Some("text/x-erb"));
    }

    #[test]
    fn test_parse_engine_default_output() {
        let parsed = parse_name("app.coffee", &registry());
        assert_eq!(parsed.name, "app");
        assert_eq!(parsed.format_ext, None);
        assert_eq!(parsed.content_type.as_deref(), Some(types::JAVASCRIPT));
        assert_eq!(parsed.source_type.as_deref(), Some("text/coffeescript"));
    }

    #[test]
    fn test_parse_unknown() {
        let parsed = parse_name("README", &registry());
        assert_eq!(parsed.name, "README");
        assert_eq!(parsed.content_type, None);

        let parsed = parse_name(".eslintrc.json", &registry());
        assert_eq!(parsed.name, ".eslintrc");
    }

    #[test]
    fn test_logical_path() {
        let stat = FileStat {
            size: 1,
            mtime: 0,
            mode: 0o644,
            is_dir: false,
        };
        let reg = registry();
        let root = Path::new("/app/assets");

        let entity = SourceEntity::new(root, Path::new("/app/assets/foo/index.js"), stat, &reg);
        assert_eq!(entity.logical_path, "foo/index.js");
        assert!(entity.is_index());

        let entity = SourceEntity::new(root, Path::new("/app/assets/app.coffee"), stat, &reg);
        assert_eq!(entity.logical_path, "app.js");
        assert_eq!(entity.content_type, types::JAVASCRIPT);

        let entity = SourceEntity::new(root, Path::new("/app/assets/x/y.css.erb"), stat, &reg);
        assert_eq!(entity.logical_path, "x/y.css");
        assert_eq!(
            entity.uri(types::CSS).build(),
            "file:///app/assets/x/y.css.erb?type=text/css"
        );
    }
}
