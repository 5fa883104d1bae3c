//! Text decoding for source files.
//!
//! Sources are UTF-8 unless a byte order mark says UTF-16. The BOM is
//! stripped so it never ends up in the middle of a bundle.

use std::path::Path;

use crate::error::{AssetError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Decode file bytes into a `String`.
pub fn decode_text(bytes: Vec<u8>, path: &Path) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return decode_utf16(rest, u16::from_le_bytes, path);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return decode_utf16(rest, u16::from_be_bytes, path);
    }

    let bytes = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };
    String::from_utf8(bytes).map_err(|e| AssetError::Encoding {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16, path: &Path) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(AssetError::Encoding {
            path: path.to_path_buf(),
            message: "odd byte count for UTF-16".into(),
        });
    }
    let units = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| AssetError::Encoding {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
