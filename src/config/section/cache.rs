//! `[cache]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! enabled = true
//! memory_entries = 1024      # In-process MRU tier
//! dir = ".assetweave/cache"  # On-disk tier, relative to the config file
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MEMORY_ENTRIES;
use crate::config::FieldPath;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub memory_entries: usize,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_entries: DEFAULT_MEMORY_ENTRIES,
            dir: PathBuf::from(".assetweave/cache"),
        }
    }
}

impl CacheConfig {
    pub const DIR: FieldPath = FieldPath::new("cache.dir");
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::Path;

    #[test]
    fn test_cache_config() {
        let config = test_parse_config("[cache]\nenabled = false\nmemory_entries = 16\ndir = \"tmp/c\"");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.memory_entries, 16);
        assert_eq!(config.cache.dir, Path::new("tmp/c"));
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = test_parse_config("");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.memory_entries, 1024);
        assert_eq!(config.cache.dir, Path::new(".assetweave/cache"));
    }
}
