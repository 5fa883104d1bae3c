use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use super::*;
use crate::asset::Body;
use crate::cache::CacheStats;
use crate::sourcemap::Position;
use crate::utils::mime::types;

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    dir: TempDir,
    env: Environment,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut env = Environment::new();
        env.append_path(dir.path());
        Self { dir, env }
    }

    fn root(&self) -> PathBuf {
        self.env.roots()[0].clone()
    }

    fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> &Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    /// Move a file's mtime without touching its bytes.
    fn touch(&self, rel: &str, secs_ahead: u64) {
        let file = fs::File::options()
            .write(true)
            .open(self.dir.path().join(rel))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs_ahead))
            .unwrap();
    }

    fn find(&self, logical: &str) -> Asset {
        self.env.find_asset(logical, &Accept::any()).unwrap()
    }

    fn text(&self, logical: &str) -> String {
        self.find(logical).text().unwrap().to_string()
    }

    fn stats(&self) -> CacheStats {
        self.env.cache().stats()
    }

    fn app(&self) -> &Self {
        self.write("project.js", "var project;\n")
            .write("users.js", "var users;\n")
            .write(
                "application.js",
                "//= require project\n//= require users\nvar app;\n",
            )
    }
}

fn path_of(uri: &AssetUri) -> PathBuf {
    uri.to_path_buf()
}

// ============================================================================
// Bundles
// ============================================================================

#[test]
fn test_gallery_is_raw_body() {
    let fx = Fixture::new();
    fx.write("gallery.js", "var gallery = [];\n");

    let asset = fx.find("gallery.js");
    assert_eq!(asset.bytes(), b"var gallery = [];\n");
    assert_eq!(asset.logical_path, "gallery.js");
    assert_eq!(asset.content_type, types::JAVASCRIPT);
    assert_eq!(asset.digest, Digest::of("var gallery = [];\n"));
    assert_eq!(asset.constituents.len(), 1);
}

#[test]
fn test_application_requires_in_order() {
    let fx = Fixture::new();
    fx.app();

    let asset = fx.find("application.js");
    assert_eq!(
        asset.text().unwrap(),
        "var project;\n\nvar users;\n\n\n\nvar app;\n"
    );

    let order: Vec<PathBuf> = asset.constituents.iter().map(path_of).collect();
    let root = fx.root();
    assert_eq!(
        order,
        [
            root.join("project.js"),
            root.join("users.js"),
            root.join("application.js")
        ]
    );
}

#[test]
fn test_bundle_source_map_points_at_files() {
    let fx = Fixture::new();
    fx.app();

    let map = fx.find("application.js").source_map;
    assert_eq!(map.lookup(Position::new(1, 0)).unwrap().source, "project.js");
    assert_eq!(map.lookup(Position::new(3, 0)).unwrap().source, "users.js");

    let app = map.lookup(Position::new(7, 0)).unwrap();
    assert_eq!(app.source, "application.js");
    assert_eq!(app.original, Position::new(3, 0));
}

#[test]
fn test_custom_separator() {
    let mut fx = Fixture::new();
    fx.write("a.js", "a()").write("b.js", "b()").write(
        "main.js",
        "//= require a\n//= require b\n",
    );
    fx.env.set_separator(";\n");
    assert_eq!(fx.text("main.js"), "a();\nb();\n\n\n");
}

#[test]
fn test_stub_prunes_closure() {
    let fx = Fixture::new();
    fx.write("y.js", "var y;\n")
        .write("x.js", "//= require y\nvar x;\n")
        .write("other.js", "//= require x\nvar other;\n")
        .write(
            "application.js",
            "//= require other\n//= stub x\nvar app;\n",
        );

    let text = fx.text("application.js");
    assert!(text.contains("var other;"));
    assert!(text.contains("var app;"));
    assert!(!text.contains("var x;"));
    assert!(!text.contains("var y;"));
}

#[test]
fn test_cycle_rotates_root_last() {
    let fx = Fixture::new();
    fx.write("a.js", "//= require b\nvar a;\n")
        .write("b.js", "//= require c\nvar b;\n")
        .write("c.js", "//= require a\nvar c;\n");

    let text = fx.text("a.js");
    let pos = |s: &str| text.find(s).unwrap();
    assert!(pos("var c;") < pos("var b;"));
    assert!(pos("var b;") < pos("var a;"));
}

#[test]
fn test_require_tree_order() {
    let fx = Fixture::new();
    fx.write("lib/b.js", "var b;\n")
        .write("lib/a.js", "var a;\n")
        .write("lib/index.js", "var index;\n")
        .write("lib/sub/c.js", "var c;\n")
        .write("lib/notes.txt", "ignored\n")
        .write("all.js", "//= require_tree ./lib\n");

    let text = fx.text("all.js");
    let pos = |s: &str| text.find(s).unwrap();
    assert!(pos("var a;") < pos("var b;"));
    assert!(pos("var b;") < pos("var c;"));
    assert!(pos("var c;") < pos("var index;"));
    assert!(!text.contains("ignored"));
}

#[test]
fn test_missing_require_fails_whole_build() {
    let fx = Fixture::new();
    fx.write("broken.js", "//= require nowhere\nvar a;\n");
    let err = fx.env.find_asset("broken.js", &Accept::any()).unwrap_err();
    assert_eq!(err.kind(), "file-not-found");
    assert!(err.to_string().contains("broken.js"));
}

#[test]
fn test_binary_passthrough() {
    let fx = Fixture::new();
    let png = [0x89u8, b'P', b'N', b'G', 0, 0xff];
    fx.write("logo.png", png);

    let asset = fx.find("logo.png");
    assert_eq!(asset.body, Body::Binary(png.to_vec()));
    assert_eq!(asset.content_type, types::PNG);
    assert_eq!(asset.text(), None);
}

#[test]
fn test_load_self_pipeline() {
    let fx = Fixture::new();
    fx.app();
    let index = fx.env.index();

    let uri = AssetUri::new(&fx.root().join("application.js"), Some(types::JAVASCRIPT))
        .with_param("pipeline", "self");
    let own = index.load(&uri.build()).unwrap();
    assert_eq!(own.text(), Some("\n\nvar app;\n"));
    assert!(own.uri.is_self_pipeline());

    let full = index.load(&uri.without_param("pipeline").build()).unwrap();
    assert_eq!(full.digest, fx.find("application.js").digest);
}

#[test]
fn test_load_outside_roots() {
    let fx = Fixture::new();
    let elsewhere = TempDir::new().unwrap();
    let file = elsewhere.path().join("x.js");
    fs::write(&file, "x").unwrap();

    let uri = AssetUri::new(&normalize_path(&file), Some(types::JAVASCRIPT));
    let err = fx.env.index().load(&uri.build()).unwrap_err();
    assert_eq!(err.kind(), "file-outside-paths");
}

// ============================================================================
// Caching and freshness
// ============================================================================

#[test]
fn test_mtime_churn_keeps_digest_and_mtime() {
    let fx = Fixture::new();
    fx.app();
    let first = fx.find("application.js");

    fx.touch("users.js", 120);
    fx.touch("application.js", 240);
    let before = fx.stats();
    let second = fx.find("application.js");

    assert_eq!(second.digest, first.digest);
    assert_eq!(second.mtime, first.mtime);
    let after = fx.stats();
    assert_eq!(after.hits, before.hits + 1);
    assert_eq!(after.misses, before.misses);
}

#[test]
fn test_content_change_changes_digest() {
    let fx = Fixture::new();
    fx.app();
    let first = fx.find("application.js");

    fx.write("users.js", "var users = [];\n");
    let second = fx.find("application.js");
    assert_ne!(second.digest, first.digest);
    assert!(second.text().unwrap().contains("var users = [];"));
}

#[test]
fn test_new_file_in_tree_invalidates() {
    let fx = Fixture::new();
    fx.write("lib/a.js", "var a;\n")
        .write("all.js", "//= require_tree ./lib\n");
    assert!(!fx.text("all.js").contains("var b;"));

    fx.write("lib/b.js", "var b;\n");
    assert!(fx.text("all.js").contains("var b;"));
}

#[test]
fn test_version_rollback_hits_cache() {
    let mut fx = Fixture::new();
    fx.app();

    fx.env.set_version("1");
    let v1 = fx.find("application.js");
    fx.env.set_version("2");
    fx.find("application.js");

    fx.env.set_version("1");
    let before = fx.stats();
    let again = fx.find("application.js");
    let after = fx.stats();

    assert_eq!(again, v1);
    assert_eq!(after.misses, before.misses);
    assert_eq!(after.hits, before.hits + 1);
}

#[test]
fn test_version_change_rebuilds() {
    let mut fx = Fixture::new();
    fx.write("gallery.js", "g;\n");
    fx.find("gallery.js");

    fx.env.set_version("next");
    let before = fx.stats();
    fx.find("gallery.js");
    assert!(fx.stats().misses > before.misses);
}

#[test]
fn test_depend_on_asset_ignores_mtime_churn() {
    let fx = Fixture::new();
    fx.write("data.json", "{\"a\":1}")
        .write("app.js", "//= depend_on_asset data.json\nvar app;\n");
    let first = fx.find("app.js");
    assert!(
        first
            .dependency_paths()
            .iter()
            .any(|p| p.ends_with("data.json"))
    );

    fx.touch("data.json", 60);
    let before = fx.stats();
    fx.find("app.js");
    assert_eq!(fx.stats().misses, before.misses);

    fx.write("data.json", "{\"a\":2}");
    let before = fx.stats();
    let rebuilt = fx.find("app.js");
    assert!(fx.stats().misses > before.misses);
    assert_eq!(rebuilt.digest, first.digest, "body does not include data.json");
}

#[test]
fn test_depend_on_tracks_mtime() {
    let fx = Fixture::new();
    fx.write("config.yml", "a: 1\n")
        .write("app.js", "//= depend_on config.yml\nvar app;\n");
    fx.find("app.js");

    fx.touch("config.yml", 60);
    let before = fx.stats();
    fx.find("app.js");
    assert!(fx.stats().misses > before.misses);
}

#[test]
fn test_index_stats_each_path_once() {
    let fx = Fixture::new();
    fx.app();
    let index = fx.env.index();

    index.find_asset("application.js", &Accept::any()).unwrap();
    let stats = index.stats().stat_calls();
    let lists = index.stats().list_calls();

    index.find_asset("application.js", &Accept::any()).unwrap();
    index.find_asset("users.js", &Accept::any()).unwrap();
    assert_eq!(index.stats().stat_calls(), stats);
    assert_eq!(index.stats().list_calls(), lists);
}

#[test]
fn test_index_is_a_snapshot() {
    let mut fx = Fixture::new();
    fx.write("gallery.js", "g;\n");
    let index = fx.env.index();

    fx.env.clear_paths();
    assert!(fx.env.find_asset("gallery.js", &Accept::any()).is_err());
    assert!(index.find_asset("gallery.js", &Accept::any()).is_ok());
}

#[test]
fn test_disabled_cache_always_builds() {
    let mut fx = Fixture::new();
    fx.env.set_cache(Arc::new(CacheCoordinator::disabled()));
    fx.app();

    let first = fx.find("application.js");
    let second = fx.find("application.js");
    assert_eq!(first, second);
    assert_eq!(fx.stats().hits, 0);
}

#[test]
fn test_file_backend_survives_new_environment() {
    let fx = Fixture::new();
    fx.app();
    let cache_dir = TempDir::new().unwrap();
    let file_cache = || {
        Arc::new(CacheCoordinator::new(
            16,
            Arc::new(FileStore::new(cache_dir.path())),
        ))
    };

    let mut env = fx.env.clone();
    env.set_cache(file_cache());
    let first = env.find_asset("application.js", &Accept::any()).unwrap();

    let mut fresh = Environment::new();
    fresh.append_path(fx.dir.path());
    fresh.set_cache(file_cache());
    let second = fresh.find_asset("application.js", &Accept::any()).unwrap();

    assert_eq!(first, second);
    assert_eq!(fresh.cache().stats().hits, 1);
}

// ============================================================================
// Processing
// ============================================================================

#[test]
fn test_css_charset_hoisted_once() {
    let fx = Fixture::new();
    fx.write("a.css", "body { color: red; }\n@charset \"UTF-8\";\n")
        .write("b.css", "@charset \"utf-8\";\np { margin: 0; }\n")
        .write("main.css", "/*\n *= require a\n *= require b\n */\n");

    let asset = fx.find("main.css");
    let text = asset.text().unwrap();
    assert!(text.starts_with("@charset \"UTF-8\";\n"));
    assert_eq!(text.matches("@charset").count(), 1);
    assert_eq!(asset.charset.as_deref(), Some("utf-8"));
    assert_eq!(asset.content_type, types::CSS);
}

#[test]
fn test_compressor_applies_to_bundle() {
    let mut fx = Fixture::new();
    fx.write(
        "math.js",
        "function add(first, second) {\n  return first + second;\n}\nexport { add };\n",
    );
    let plain = fx.find("math.js");

    fx.env.set_compressor(types::JAVASCRIPT, Some("oxc"));
    let small = fx.find("math.js");
    assert!(small.length < plain.length);
    assert_ne!(small.digest, plain.digest);

    fx.env.set_compressor(types::JAVASCRIPT, None);
    assert_eq!(fx.find("math.js").digest, plain.digest);
}

#[test]
fn test_unknown_compressor() {
    let mut fx = Fixture::new();
    fx.write("a.js", "a;\n");
    fx.env.set_compressor(types::JAVASCRIPT, Some("nope"));
    let err = fx.env.find_asset("a.js", &Accept::any()).unwrap_err();
    assert_eq!(err.kind(), "processor");
}

#[test]
fn test_registered_processor_runs_per_file() {
    use crate::processor::{FnProcessor, Input, Output};

    let mut fx = Fixture::new();
    fx.app();
    fx.env.registry_mut().register_postprocessor(
        types::JAVASCRIPT,
        Arc::new(FnProcessor::new("upper", |i: &Input| {
            Ok(Output::Data(i.data.to_uppercase()))
        })),
    );

    let text = fx.text("application.js");
    assert!(text.contains("VAR PROJECT;"));
    assert!(text.contains("VAR APP;"));
}

#[test]
fn test_links_reach_descriptor() {
    let fx = Fixture::new();
    fx.write("logo.png", [1u8, 2, 3])
        .write("app.js", "//= link logo.png\nvar app;\n");

    let asset = fx.find("app.js");
    let logo = AssetUri::new(&fx.root().join("logo.png"), Some(types::PNG)).build();
    assert!(asset.links.contains(&logo));

    let descriptor = asset.descriptor();
    assert_eq!(descriptor.links, [logo]);
    assert!(descriptor.digest_path.starts_with("app-"));
    assert!(
        descriptor
            .dependencies
            .iter()
            .any(|p| Path::new(p).ends_with("app.js"))
    );
}

// ============================================================================
// Batches and listing
// ============================================================================

#[test]
fn test_build_all() {
    let mut fx = Fixture::new();
    fx.app().write("gallery.js", "g;\n");
    fx.env.set_jobs(2);

    let assets = fx.env.build_all(&["gallery.js", "application.js"]).unwrap();
    let names: Vec<&str> = assets.iter().map(|a| a.logical_path.as_str()).collect();
    assert_eq!(names, ["gallery.js", "application.js"]);

    assert!(fx.env.build_all(&["gallery.js", "missing.js"]).is_err());
}

#[test]
fn test_logical_paths_first_root_wins() {
    let fx = Fixture::new();
    fx.write("shared.js", "first;\n").write("nested/deep.css", "a{}\n");
    let second = TempDir::new().unwrap();
    fs::write(second.path().join("shared.js"), "second;\n").unwrap();
    fs::write(second.path().join("only.js"), "only;\n").unwrap();

    let mut env = fx.env.clone();
    env.append_path(second.path());
    assert_eq!(
        env.logical_paths(),
        ["nested/deep.css", "only.js", "shared.js"]
    );
    assert_eq!(
        env.find_asset("shared.js", &Accept::any()).unwrap().text(),
        Some("first;\n")
    );
}

#[test]
fn test_environment_digest() {
    let fx = Fixture::new();
    let mut env = fx.env.clone();
    let base = env.digest();

    env.set_version("2");
    assert_ne!(env.digest(), base);
    env.set_version("");
    assert_eq!(env.digest(), base);

    env.set_compressor(types::CSS, Some("lightningcss"));
    assert_ne!(env.digest(), base);
}

#[test]
fn test_from_config() {
    let fx = Fixture::new();
    let mut config = AssetConfig::default();
    config.paths.roots = vec![fx.root()];
    config.build.version = "7".into();
    config.build.compress.css = Some("lightningcss".into());
    config.cache.enabled = false;

    let env = Environment::from_config(&config);
    assert_eq!(env.roots(), [fx.root()]);
    assert_eq!(env.version(), "7");
    assert_eq!(
        env.options().compressors.get(types::CSS).map(String::as_str),
        Some("lightningcss")
    );
}
