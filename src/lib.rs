//! assetweave - resolve, bundle, process and cache web assets by logical path.
//!
//! ```text
//! Environment ── index() ──▶ Index (frozen registry, stat memo)
//!                              │
//!   find_asset("app.js") ──▶ Resolver ──▶ directive walk ──▶ per-file pipeline
//!                                                                │
//!                              Asset ◀── bundle pipeline ◀── concatenate
//! ```
//!
//! Every stage after resolution goes through the [`cache::CacheCoordinator`].

#[macro_use]
pub mod logger;

pub mod asset;
pub mod cache;
pub mod config;
pub mod directive;
pub mod environment;
pub mod error;
pub mod processor;
pub mod resolver;
pub mod sourcemap;
pub mod uri;
pub mod utils;

pub use asset::{ArtifactDescriptor, Asset, Body};
pub use cache::{CacheBackend, CacheCoordinator, FileStore, NullStore};
pub use config::AssetConfig;
pub use environment::{BuildOptions, Environment, Index};
pub use error::{AssetError, Result};
pub use processor::{Input, Output, Processor, Registry};
pub use uri::AssetUri;
pub use utils::mime::Accept;
