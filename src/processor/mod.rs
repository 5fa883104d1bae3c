//! Processor pipeline.
//!
//! A processor turns one [`Input`] record into an [`Output`]. Stages are
//! registered per content type in a [`Registry`] and chained with
//! [`compose`] in a fixed order:
//!
//! ```text
//! preprocessors(source type)
//!   → engines (rightmost extension first)
//!   → transformer (content type → requested type)
//!   → postprocessors(requested type)
//!   → bundle processors (once per bundle)
//!   → compressors (once per bundle, selected by config)
//! ```

mod builtin;
mod compose;
pub mod metadata;
mod minify;
mod registry;

pub use builtin::{CharsetNormalizer, DirectiveProcessor, FnProcessor};
pub use compose::{Composed, compose};
pub use metadata::{CacheKey, MetaValue, Metadata};
pub use minify::{CssMinifier, JsMinifier};
pub use registry::{DEFAULT_REGISTRY, Engine, FrozenRegistry, Registry};

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::error::Result;
use crate::uri::AssetUri;

/// Record handed to a processor.
#[derive(Clone)]
pub struct Input {
    pub data: String,
    pub content_type: String,
    pub source_path: PathBuf,
    pub logical_path: String,
    pub uri: AssetUri,
    pub metadata: Metadata,
    pub cache: Option<Arc<CacheCoordinator>>,
}

impl Input {
    /// Copy of this input carrying different data and metadata.
    pub fn with(&self, data: String, metadata: Metadata) -> Self {
        Self {
            data,
            metadata,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input")
            .field("content_type", &self.content_type)
            .field("source_path", &self.source_path)
            .field("logical_path", &self.logical_path)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// What a processor returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// New data, metadata unchanged.
    Data(String),
    /// New data plus metadata to merge into the running record.
    Record { data: String, metadata: Metadata },
}

impl Output {
    pub fn into_parts(self) -> (String, Metadata) {
        match self {
            Self::Data(data) => (data, Metadata::new()),
            Self::Record { data, metadata } => (data, metadata),
        }
    }
}

/// A pipeline stage.
pub trait Processor: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &str;

    fn process(&self, input: &Input) -> Result<Output>;

    /// Identity for cache keying. Stages without one are keyed as `Nil`.
    fn cache_key(&self) -> Option<CacheKey> {
        None
    }
}

impl std::fmt::Debug for dyn Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Processor({})", self.name())
    }
}

/// Shared processor handle.
pub type ProcessorRef = Arc<dyn Processor>;
