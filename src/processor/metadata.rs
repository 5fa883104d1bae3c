//! Processor metadata and cache keys.
//!
//! Metadata is an ordered map of named values. A handful of keys carry a
//! fixed shape and merge semantics:
//!
//! | key            | shape          | merge             |
//! |----------------|----------------|-------------------|
//! | `map`          | source map     | `combine`         |
//! | `dependencies` | set of strings | union             |
//! | `required`     | set of strings | union             |
//! | `stubbed`      | set of strings | union             |
//! | `links`        | set of strings | union             |
//! | `charset`      | string         | later stage wins  |
//!
//! Every other key is a scalar, list or set and the later stage wins.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};
use crate::sourcemap::{self, SourceMap};
use crate::utils::hash::DigestBuilder;

/// Well-known metadata keys.
pub mod keys {
    pub const MAP: &str = "map";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const REQUIRED: &str = "required";
    pub const STUBBED: &str = "stubbed";
    pub const LINKS: &str = "links";
    pub const CHARSET: &str = "charset";

    /// Keys holding string sets that merge by union.
    pub const SET_KEYS: &[&str] = &[DEPENDENCIES, REQUIRED, STUBBED, LINKS];
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<MetaValue>),
    Set(IndexSet<String>),
    Map(Box<SourceMap>),
}

impl MetaValue {
    fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "source map",
        }
    }

    pub fn as_set(&self) -> Option<&IndexSet<String>> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SourceMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<SourceMap> for MetaValue {
    fn from(map: SourceMap) -> Self {
        Self::Map(Box::new(map))
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl<S: Into<String>> FromIterator<S> for MetaValue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::Set(iter.into_iter().map(Into::into).collect())
    }
}

/// Metadata map carried between processor stages.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Check that known keys keep their contracted shape.
pub fn validate(processor: &str, metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        let expected = match key.as_str() {
            keys::MAP => matches!(value, MetaValue::Map(_)).then_some(()).ok_or("source map"),
            keys::CHARSET => matches!(value, MetaValue::Str(_)).then_some(()).ok_or("string"),
            k if keys::SET_KEYS.contains(&k) => {
                matches!(value, MetaValue::Set(_)).then_some(()).ok_or("set")
            }
            "" => {
                return Err(AssetError::InvalidProcessorResult {
                    processor: processor.to_string(),
                    message: "metadata key must not be empty".into(),
                });
            }
            _ => Ok(()),
        };
        if let Err(expected) = expected {
            return Err(AssetError::InvalidProcessorResult {
                processor: processor.to_string(),
                message: format!("'{key}' must be a {expected}, got {}", value.shape()),
            });
        }
    }
    Ok(())
}

/// Merge `update` into `base`.
///
/// A `map` in `update` describes only the stage that produced it, so it is
/// composed onto the existing map rather than replacing it.
pub fn merge(base: &mut Metadata, update: Metadata) {
    for (key, value) in update {
        match (base.get_mut(&key), value) {
            (Some(MetaValue::Set(existing)), MetaValue::Set(incoming))
                if keys::SET_KEYS.contains(&key.as_str()) =>
            {
                existing.extend(incoming);
            }
            (Some(MetaValue::Map(existing)), MetaValue::Map(incoming)) if key == keys::MAP => {
                **existing = sourcemap::combine(existing, &incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Read a string set, empty when absent.
pub fn set_of<'a>(metadata: &'a Metadata, key: &str) -> impl Iterator<Item = &'a String> {
    metadata
        .get(key)
        .and_then(MetaValue::as_set)
        .into_iter()
        .flatten()
}

// ============================================================================
// Cache keys
// ============================================================================

/// Identity of a processor for cache keying.
///
/// Composed processors produce a `List` with one entry per stage; a stage
/// without its own key contributes `Nil` so that order stays visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Nil,
    Str(String),
    Int(i64),
    List(Vec<CacheKey>),
}

impl CacheKey {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Feed this key into a digest, tagging each variant.
    pub fn digest_into(&self, builder: &mut DigestBuilder) {
        match self {
            Self::Nil => {
                builder.part("nil");
            }
            Self::Str(s) => {
                builder.part("str").part(s);
            }
            Self::Int(i) => {
                builder.part("int").part(i.to_le_bytes());
            }
            Self::List(items) => {
                builder.part("list").part((items.len() as u64).to_le_bytes());
                for item in items {
                    item.digest_into(builder);
                }
            }
        }
    }
}

impl From<Option<CacheKey>> for CacheKey {
    fn from(key: Option<CacheKey>) -> Self {
        key.unwrap_or(CacheKey::Nil)
    }
}
