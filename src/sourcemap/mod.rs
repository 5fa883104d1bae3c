//! Source maps: mapping model, VLQ codec, composition and concatenation.
//!
//! Lines are 1-based and columns 0-based. A [`SourceMap`] keeps its
//! mappings sorted by generated position and records the [`Extent`] of the
//! generated text so that maps can be concatenated exactly.
//!
//! - [`vlq`]: base64 VLQ integers and `mappings` strings
//! - [`combine`]: `combine` (compose two transforms) and `concat` (append)

mod combine;
pub mod vlq;

pub use combine::{combine, concat};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};

/// A position in a text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// One generated → original correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub generated: Position,
    pub source: String,
    pub original: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mapping {
    pub fn new(generated: Position, source: impl Into<String>, original: Position) -> Self {
        Self {
            generated,
            source: source.into(),
            original,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Size of a generated text: newline count plus width of the last line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub lines: u32,
    pub column: u32,
}

impl Extent {
    /// Measure a text.
    pub fn of(text: &str) -> Self {
        let lines = text.bytes().filter(|&b| b == b'\n').count() as u32;
        let last = text.rsplit('\n').next().unwrap_or("");
        Self {
            lines,
            column: last.encode_utf16().count() as u32,
        }
    }

    /// Extent of `self` followed by `next`.
    pub fn then(self, next: Extent) -> Extent {
        if next.lines == 0 {
            Extent {
                lines: self.lines,
                column: self.column + next.column,
            }
        } else {
            Extent {
                lines: self.lines + next.lines,
                column: next.column,
            }
        }
    }
}

/// A decoded source map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    mappings: Vec<Mapping>,
    pub extent: Extent,
}

impl SourceMap {
    /// Build a map, sorting mappings by generated position.
    pub fn new(mut mappings: Vec<Mapping>, extent: Extent) -> Self {
        mappings.sort_by_key(|m| m.generated);
        Self {
            file: None,
            mappings,
            extent,
        }
    }

    /// Map with no mappings covering `text` (used for separators).
    pub fn blank(text: &str) -> Self {
        Self::new(Vec::new(), Extent::of(text))
    }

    /// Default 1:1 map: every line of `text` maps to the same line of `source`.
    pub fn identity(source: &str, text: &str) -> Self {
        let extent = Extent::of(text);
        let line_count = if text.is_empty() {
            0
        } else if text.ends_with('\n') {
            extent.lines
        } else {
            extent.lines + 1
        };
        let mappings = (1..=line_count)
            .map(|line| Mapping::new(Position::new(line, 0), source, Position::new(line, 0)))
            .collect();
        Self::new(mappings, extent)
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Sources in order of first appearance.
    pub fn sources(&self) -> IndexSet<String> {
        self.mappings.iter().map(|m| m.source.clone()).collect()
    }

    /// Names in order of first appearance.
    pub fn names(&self) -> IndexSet<String> {
        self.mappings.iter().filter_map(|m| m.name.clone()).collect()
    }

    /// Mapping covering a generated position (greatest lower bound on the same line).
    pub fn lookup(&self, generated: Position) -> Option<&Mapping> {
        let idx = self.mappings.partition_point(|m| m.generated <= generated);
        let candidate = self.mappings.get(idx.checked_sub(1)?)?;
        (candidate.generated.line == generated.line).then_some(candidate)
    }

    /// Encode the `mappings` field.
    pub fn encode_mappings(&self) -> String {
        vlq::encode_mappings(
            &self.mappings,
            &self.sources(),
            &self.names(),
            self.extent.lines + 1,
        )
    }

    /// Serialize as source map v3 JSON.
    pub fn to_json(&self) -> String {
        let raw = RawSourceMap {
            version: 3,
            file: self.file.clone(),
            sources: self.sources().into_iter().collect(),
            names: self.names().into_iter().collect(),
            mappings: self.encode_mappings(),
        };
        // Plain strings and integers always serialize.
        serde_json::to_string(&raw).unwrap_or_default()
    }

    /// Parse source map v3 JSON.
    ///
    /// The extent is reconstructed from the row count; the width of the last
    /// line is not recorded in v3 and is taken as zero.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSourceMap =
            serde_json::from_str(json).map_err(|e| AssetError::SourceMap(e.to_string()))?;
        if raw.version != 3 {
            return Err(AssetError::SourceMap(format!(
                "unsupported version {}",
                raw.version
            )));
        }
        let mappings = vlq::decode_mappings(&raw.mappings, &raw.sources, &raw.names)?;
        let extent = Extent {
            lines: raw.mappings.matches(';').count() as u32,
            column: 0,
        };
        let mut map = Self::new(mappings, extent);
        map.file = raw.file;
        Ok(map)
    }
}

/// Wire form of a v3 source map.
#[derive(Debug, Serialize, Deserialize)]
struct RawSourceMap {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}
