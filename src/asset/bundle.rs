//! Concatenation of processed files.

use serde::{Deserialize, Serialize};

use crate::sourcemap::{SourceMap, concat};

/// One processed file ready to be concatenated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub data: String,
    pub map: SourceMap,
}

/// Join parts with `separator`, concatenating their maps to match.
pub fn concatenate(parts: &[Part], separator: &str) -> (String, SourceMap) {
    let capacity = parts.iter().map(|p| p.data.len() + separator.len()).sum();
    let mut data = String::with_capacity(capacity);
    let mut map = SourceMap::default();
    let gap = SourceMap::blank(separator);

    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            data.push_str(separator);
            map = concat(&map, &gap);
        }
        data.push_str(&part.data);
        map = concat(&map, &part.map);
    }
    (data, map)
}
