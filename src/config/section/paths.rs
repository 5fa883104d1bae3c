//! `[paths]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! roots = ["app/assets/javascripts", "app/assets/stylesheets", "vendor/assets"]
//! ```
//!
//! Earlier roots win when the same logical path exists in several.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;

/// Ordered search roots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Relative entries are resolved against the config file's directory.
    pub roots: Vec<PathBuf>,
}

impl PathsConfig {
    pub const ROOTS: FieldPath = FieldPath::new("paths.roots");
}
