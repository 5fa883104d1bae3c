//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! version = "2"          # Bumping it invalidates every cached result
//! jobs = 4               # Threads for batch builds (0 = one per core)
//! separator = "\n"       # Inserted between bundled files
//!
//! [build.compress]
//! javascript = "oxc"
//! css = "lightningcss"
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::FieldPath;
use crate::utils::mime::types;

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub version: String,
    pub jobs: usize,
    pub separator: String,
    pub compress: CompressConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            jobs: 0,
            separator: "\n".to_string(),
            compress: CompressConfig::default(),
        }
    }
}

impl BuildConfig {
    pub const SEPARATOR: FieldPath = FieldPath::new("build.separator");
}

/// Bundle compressors by content type. Absent means no compression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    pub javascript: Option<String>,
    pub css: Option<String>,
}

impl CompressConfig {
    /// Compressor name per content type.
    pub fn by_content_type(&self) -> FxHashMap<String, String> {
        [(types::JAVASCRIPT, &self.javascript), (types::CSS, &self.css)]
            .into_iter()
            .filter_map(|(ct, name)| Some((ct.to_string(), name.clone()?)))
            .collect()
    }
}
