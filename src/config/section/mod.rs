//! Configuration sections.

mod build;
mod cache;
mod paths;

pub use build::{BuildConfig, CompressConfig};
pub use cache::CacheConfig;
pub use paths::PathsConfig;
