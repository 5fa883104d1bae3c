use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::processor::{FnProcessor, Input, Output, Registry};
use crate::utils::mime::types;

// ============================================================================
// Helpers
// ============================================================================

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn registry() -> Registry {
    let mut registry = Registry::default();
    let passthrough = || Arc::new(FnProcessor::new("noop", |i: &Input| Ok(Output::Data(i.data.clone()))));
    registry.register_engine(".coffee", "text/coffeescript", passthrough(), Some(types::JAVASCRIPT));
    registry.register_mime(".scss", "text/x-scss");
    registry.register_transformer("text/x-scss", types::CSS, passthrough());
    registry
}

fn resolver(roots: &[&Path]) -> Resolver {
    let roots: Vec<_> = roots.iter().map(|r| r.to_path_buf()).collect();
    Resolver::new(roots.into(), registry().freeze(), Arc::new(StatCache::new()))
}

fn resolve(resolver: &Resolver, logical: &str) -> Result<SourceEntity> {
    resolver.resolve(logical, &Accept::any(), None).map(|r| r.entity)
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn test_exact_and_stripped_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.js", "1");
    let r = resolver(&[dir.path()]);

    assert_eq!(resolve(&r, "app.js").unwrap().path, dir.path().join("app.js"));
    assert_eq!(resolve(&r, "app").unwrap().path, dir.path().join("app.js"));
    assert_eq!(resolve(&r, "app").unwrap().logical_path, "app.js");
}

#[test]
fn test_engine_extensions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.coffee", "");
    write(dir.path(), "b.js.coffee", "");
    let r = resolver(&[dir.path()]);

    let a = resolve(&r, "a.js").unwrap();
    assert_eq!(a.path, dir.path().join("a.coffee"));
    assert_eq!(a.logical_path, "a.js");
    assert_eq!(a.source_type, "text/coffeescript");

    let b = resolve(&r, "b.js").unwrap();
    assert_eq!(b.engine_exts, [".coffee"]);
    assert_eq!(b.content_type, types::JAVASCRIPT);
}

#[test]
fn test_dotted_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "jquery.min.js", "");
    let r = resolver(&[dir.path()]);
    assert_eq!(
        resolve(&r, "jquery.min").unwrap().path,
        dir.path().join("jquery.min.js")
    );
    assert!(resolve(&r, "jquery").is_err());
}

#[test]
fn test_root_order_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "shared.js", "first");
    write(second.path(), "shared.js", "second");
    write(second.path(), "only.js", "");
    let r = resolver(&[first.path(), second.path()]);

    assert_eq!(resolve(&r, "shared.js").unwrap().root, first.path());
    assert_eq!(resolve(&r, "only.js").unwrap().root, second.path());
    assert_eq!(r.resolve_all("shared.js", &Accept::any(), None).len(), 2);
}

#[test]
fn test_directory_index() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo/index.js", "");
    write(dir.path(), "foo/other.js", "");
    let r = resolver(&[dir.path()]);

    let entity = resolve(&r, "foo").unwrap();
    assert_eq!(entity.path, dir.path().join("foo/index.js"));
    assert_eq!(entity.logical_path, "foo/index.js");
    assert_eq!(resolve(&r, "foo.js").unwrap().path, entity.path);
    assert!(
        r.resolve("foo.css", &Accept::any(), None).is_err(),
        "index of the wrong type must not match"
    );
}

#[test]
fn test_package_main() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "widget/package.json", r#"{"main": "lib/widget.js"}"#);
    write(dir.path(), "widget/lib/widget.js", "");
    let r = resolver(&[dir.path()]);

    let entity = resolve(&r, "widget").unwrap();
    assert_eq!(entity.path, dir.path().join("widget/lib/widget.js"));
    assert_eq!(entity.logical_path, "widget/lib/widget.js");
}

#[test]
fn test_package_main_outside_root_ignored() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("assets");
    write(&root, "widget/package.json", r#"{"main": "../../escape.js"}"#);
    write(dir.path(), "escape.js", "");
    let r = resolver(&[&root]);
    assert!(resolve(&r, "widget").is_err());
}

// ============================================================================
// Negotiation
// ============================================================================

#[test]
fn test_quality_ordering() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.css", "");
    write(dir.path(), "a.js", "");
    let r = resolver(&[dir.path()]);

    let accept = Accept::parse("text/css;q=0.5, application/javascript");
    let candidates = r.resolve_all("a", &accept, None);
    let names: Vec<_> = candidates.iter().map(|e| e.file_name()).collect();
    assert_eq!(names, ["a.js", "a.css"]);

    // restartable
    let again: Vec<_> = (&candidates).into_iter().map(|e| e.file_name()).collect();
    assert_eq!(again, names);
}

#[test]
fn test_format_extension_narrows_accept() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.css", "");
    let r = resolver(&[dir.path()]);

    assert!(r.resolve("a.css", &Accept::only(types::JAVASCRIPT), None).is_err());
    assert!(r.resolve("a.css", &Accept::only(types::CSS), None).is_ok());
    assert!(r.resolve("a", &Accept::only(types::JAVASCRIPT), None).is_err());
}

#[test]
fn test_transformer_sources_accepted_at_lower_quality() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "theme.scss", "");
    let r = resolver(&[dir.path()]);
    let entity = resolve(&r, "theme.css").unwrap();
    assert_eq!(entity.content_type, "text/x-scss");

    write(dir.path(), "theme.css", "");
    let r = resolver(&[dir.path()]);
    let names: Vec<_> = r
        .resolve_all("theme", &Accept::only(types::CSS), None)
        .iter()
        .map(|e| e.file_name())
        .collect();
    assert_eq!(names, ["theme.css", "theme.scss"]);
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_outside_paths() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("assets");
    write(&root, "a.js", "");
    write(dir.path(), "secret.js", "");
    let r = resolver(&[&root]);

    let err = resolve(&r, "../secret.js").unwrap_err();
    assert_eq!(err.kind(), "file-outside-paths");

    let err = resolve(&r, dir.path().join("secret.js").to_str().unwrap()).unwrap_err();
    assert_eq!(err.kind(), "file-outside-paths");

    let err = resolve(&r, dir.path().join("missing.js").to_str().unwrap()).unwrap_err();
    assert_eq!(err.kind(), "file-not-found");

    assert!(resolve(&r, root.join("a.js").to_str().unwrap()).is_ok());
}

#[test]
fn test_relative_requests() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "lib/a.js", "");
    write(dir.path(), "lib/sub/b.js", "");
    let r = resolver(&[dir.path()]);
    let base = dir.path().join("lib/sub");

    let found = r.resolve("../a", &Accept::any(), Some(&base)).unwrap();
    assert_eq!(found.entity.path, dir.path().join("lib/a.js"));
    let found = r.resolve("./b.js", &Accept::any(), Some(&base)).unwrap();
    assert_eq!(found.entity.logical_path, "lib/sub/b.js");

    let err = r.resolve("../../../assetweave-no-such-file.js", &Accept::any(), Some(&base)).unwrap_err();
    assert_eq!(err.kind(), "file-not-found");
}

#[test]
fn test_each_path_stat_once() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "");
    write(dir.path(), "b.js", "");
    write(dir.path(), "c/index.js", "");
    let r = resolver(&[dir.path()]);

    resolve(&r, "a").unwrap();
    let (stats, lists) = (r.stats().stat_calls(), r.stats().list_calls());
    resolve(&r, "a").unwrap();
    resolve(&r, "b.js").unwrap();
    resolve(&r, "c").unwrap();
    resolve(&r, "c").unwrap();

    assert_eq!(r.stats().stat_calls(), stats + 1, "only c/index.js is new");
    assert_eq!(r.stats().list_calls(), lists + 1, "only c/ is new");
}

#[test]
fn test_reports_directory_dependencies() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x/y.js", "");
    let r = resolver(&[dir.path()]);
    let resolved = r.resolve("x/y", &Accept::any(), None).unwrap();
    assert!(
        resolved
            .dependencies
            .contains(&dependency::dir_listing(&dir.path().join("x")))
    );
}
