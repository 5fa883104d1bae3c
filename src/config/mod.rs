//! Configuration for `assetweave.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # [paths], [build], [cache]
//! ├── types/     # ConfigError, validation problems, field paths
//! ├── util.rs    # config file discovery
//! └── mod.rs     # AssetConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section            | Purpose                                   |
//! |--------------------|-------------------------------------------|
//! | `[paths]`          | Ordered search roots                      |
//! | `[build]`          | Version, jobs, separator                  |
//! | `[build.compress]` | Bundle compressor per content type        |
//! | `[cache]`          | Memory tier size, on-disk tier directory  |

pub mod section;
pub mod types;
mod util;

pub use section::{BuildConfig, CacheConfig, CompressConfig, PathsConfig};
pub use types::{ConfigError, FieldPath, Problem, Problems};
pub use util::find_config_file;

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::utils::path::{is_within, normalize_path};

/// Default config file name.
pub const CONFIG_FILE: &str = "assetweave.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `assetweave.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding the config file; relative paths resolve here
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl AssetConfig {
    /// Parse TOML without touching the filesystem.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read, resolve and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::parse(&content)?;

        config.config_path = normalize_path(path);
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.resolve_paths();
        config.validate()?;

        crate::debug!(
            "config";
            "loaded {} ({} roots)",
            config.config_path.display(),
            config.paths.roots.len()
        );
        Ok(config)
    }

    /// Search upward from `start` for `name` and load it.
    pub fn discover(start: &Path, name: &Path) -> Result<Self, ConfigError> {
        match find_config_file(start, name) {
            Some(path) => Self::load(&path),
            None => Err(ConfigError::Io(
                name.to_path_buf(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
            )),
        }
    }

    /// Make every configured path absolute against [`AssetConfig::root`].
    fn resolve_paths(&mut self) {
        let root = self.root.clone();
        let absolute = |path: &Path| normalize_path(&root.join(path));
        self.paths.roots = self.paths.roots.iter().map(|p| absolute(p)).collect();
        self.cache.dir = absolute(&self.cache.dir);
    }

    /// Check the whole file and report every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Problems::default();

        if self.paths.roots.is_empty() {
            problems.report_with_hint(
                PathsConfig::ROOTS,
                "at least one root is required",
                "roots = [\"app/assets/javascripts\"]",
            );
        }

        let mut seen = FxHashSet::default();
        for root in &self.paths.roots {
            if !seen.insert(root) {
                problems.report(
                    PathsConfig::ROOTS,
                    format!("'{}' is listed more than once", root.display()),
                );
                continue;
            }
            match fs::metadata(root) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => problems.report(
                    PathsConfig::ROOTS,
                    format!("'{}' is not a directory", root.display()),
                ),
                Err(_) => problems.report(
                    PathsConfig::ROOTS,
                    format!("'{}' does not exist", root.display()),
                ),
            }
        }

        if self.cache.enabled
            && let Some(root) = self.paths.roots.iter().find(|r| is_within(&self.cache.dir, r))
        {
            problems.report_with_hint(
                CacheConfig::DIR,
                format!(
                    "'{}' is inside the root '{}'",
                    self.cache.dir.display(),
                    root.display()
                ),
                "cached entries would be picked up as assets; move the directory out of every root",
            );
        }

        if self.build.separator.contains('\r') {
            problems.report(BuildConfig::SEPARATOR, "carriage returns are not allowed");
        }

        problems.finish()
    }
}

/// Parse a config snippet in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AssetConfig {
    AssetConfig::parse(content).expect("valid test config")
}
