//! Base64 VLQ codec used by source map v3 `mappings` strings.
//!
//! Each integer is split into 5-bit groups, least significant first. Every
//! group but the last carries the continuation bit (32). The sign lives in
//! the lowest bit of the first group.

use indexmap::IndexSet;

use super::{Mapping, Position};
use crate::error::{AssetError, Result};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const SHIFT: u32 = 5;
const MASK: u8 = 0b1_1111;
const CONTINUATION: u8 = 0b10_0000;
/// Highest shift a group may carry while the value still fits an `i64`
/// magnitude plus the sign bit.
const MAX_SHIFT: u32 = 65;

/// Encode a sequence of integers.
pub fn encode(values: &[i64]) -> String {
    let mut out = String::new();
    for &value in values {
        encode_value(value, &mut out);
    }
    out
}

/// Append one VLQ-encoded integer.
pub fn encode_value(value: i64, out: &mut String) {
    // 65 bits: the magnitude of `i64::MIN` shifted left by one.
    let mut vlq = (u128::from(value.unsigned_abs()) << 1) | u128::from(value < 0);

    loop {
        let mut digit = (vlq & u128::from(MASK)) as u8;
        vlq >>= SHIFT;
        if vlq > 0 {
            digit |= CONTINUATION;
        }
        out.push(BASE64[usize::from(digit)] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode a string of VLQ integers.
pub fn decode(input: &str) -> Result<Vec<i64>> {
    let mut values = Vec::new();
    let mut value: u128 = 0;
    let mut shift = 0u32;
    let mut pending = false;

    for ch in input.bytes() {
        let digit = base64_value(ch)
            .ok_or_else(|| AssetError::SourceMap(format!("invalid base64 digit '{}'", ch as char)))?;
        if shift > MAX_SHIFT {
            return Err(AssetError::SourceMap("vlq value overflows".into()));
        }
        value |= u128::from(digit & MASK) << shift;
        if digit & CONTINUATION != 0 {
            shift += SHIFT;
            pending = true;
        } else {
            values.push(to_signed(value)?);
            value = 0;
            shift = 0;
            pending = false;
        }
    }

    if pending {
        return Err(AssetError::SourceMap("truncated vlq value".into()));
    }
    Ok(values)
}

fn to_signed(vlq: u128) -> Result<i64> {
    let negative = vlq & 1 == 1;
    let magnitude = i128::try_from(vlq >> 1)
        .map_err(|_| AssetError::SourceMap("vlq value overflows".into()))?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| AssetError::SourceMap("vlq value overflows".into()))
}

fn base64_value(ch: u8) -> Option<u8> {
    let v = match ch {
        b'A'..=b'Z' => ch - b'A',
        b'a'..=b'z' => ch - b'a' + 26,
        b'0'..=b'9' => ch - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(v)
}

// ============================================================================
// Mapping strings
// ============================================================================

/// Encode sorted mappings into a v3 `mappings` string.
///
/// The generated column resets on every row; source index, original line,
/// original column and name index are deltas across the whole string.
/// `rows` is the minimum number of rows to emit (trailing empty rows keep
/// the generated line count).
pub fn encode_mappings(
    mappings: &[Mapping],
    sources: &IndexSet<String>,
    names: &IndexSet<String>,
    rows: u32,
) -> String {
    let mut out = String::new();
    let mut row = 1u32;
    let mut prev_column = 0i64;
    let mut prev_source = 0i64;
    let mut prev_line = 0i64;
    let mut prev_orig_column = 0i64;
    let mut prev_name = 0i64;
    let mut first_in_row = true;

    for mapping in mappings {
        while row < mapping.generated.line {
            out.push(';');
            row += 1;
            prev_column = 0;
            first_in_row = true;
        }
        if !first_in_row {
            out.push(',');
        }
        first_in_row = false;

        let column = i64::from(mapping.generated.column);
        encode_value(column - prev_column, &mut out);
        prev_column = column;

        let source = sources.get_index_of(&mapping.source).unwrap_or(0) as i64;
        encode_value(source - prev_source, &mut out);
        prev_source = source;

        let line = i64::from(mapping.original.line) - 1;
        encode_value(line - prev_line, &mut out);
        prev_line = line;

        let orig_column = i64::from(mapping.original.column);
        encode_value(orig_column - prev_orig_column, &mut out);
        prev_orig_column = orig_column;

        if let Some(name) = mapping.name.as_ref().and_then(|n| names.get_index_of(n)) {
            let name = name as i64;
            encode_value(name - prev_name, &mut out);
            prev_name = name;
        }
    }

    while row < rows {
        out.push(';');
        row += 1;
    }
    out
}

/// Decode a v3 `mappings` string against its source and name tables.
///
/// Single-field segments (generated column only) carry no source and are
/// skipped.
pub fn decode_mappings(input: &str, sources: &[String], names: &[String]) -> Result<Vec<Mapping>> {
    let mut mappings = Vec::new();
    let mut prev_source = 0i64;
    let mut prev_line = 0i64;
    let mut prev_orig_column = 0i64;
    let mut prev_name = 0i64;

    for (row, line) in input.split(';').enumerate() {
        let mut prev_column = 0i64;
        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode(segment)?;
            match fields.len() {
                1 => {
                    prev_column += fields[0];
                    continue;
                }
                4 | 5 => {}
                n => {
                    return Err(AssetError::SourceMap(format!(
                        "segment '{segment}' has {n} fields"
                    )));
                }
            }

            prev_column += fields[0];
            prev_source += fields[1];
            prev_line += fields[2];
            prev_orig_column += fields[3];

            let source = usize::try_from(prev_source)
                .ok()
                .and_then(|i| sources.get(i))
                .ok_or_else(|| AssetError::SourceMap(format!("source index {prev_source} out of range")))?;

            let name = if fields.len() == 5 {
                prev_name += fields[4];
                let name = usize::try_from(prev_name)
                    .ok()
                    .and_then(|i| names.get(i))
                    .ok_or_else(|| AssetError::SourceMap(format!("name index {prev_name} out of range")))?;
                Some(name.clone())
            } else {
                None
            };

            mappings.push(Mapping {
                generated: Position::new(row as u32 + 1, to_u32(prev_column)?),
                source: source.clone(),
                original: Position::new(to_u32(prev_line + 1)?, to_u32(prev_orig_column)?),
                name,
            });
        }
    }

    Ok(mappings)
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| AssetError::SourceMap(format!("coordinate {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(&[0]), "A");
        assert_eq!(encode(&[1]), "C");
        assert_eq!(encode(&[-1]), "D");
        assert_eq!(encode(&[15]), "e");
        assert_eq!(encode(&[16]), "gB");
        assert_eq!(encode(&[0, 0, 16, 1]), "AAgBC");
    }

    #[test]
    fn test_extreme_values_terminate_and_roundtrip() {
        for n in [i64::MIN, i64::MAX, 1 << 62, -(1 << 62), (1 << 62) - 1] {
            let encoded = encode(&[n]);
            assert!(encoded.len() <= 14, "{n} -> {encoded}");
            assert_eq!(decode(&encoded).unwrap(), vec![n], "value {n}");
        }
    }

    #[test]
    fn test_decode_rejects_values_beyond_i64() {
        // 13 full groups then a terminator: a 65-bit magnitude of all ones
        assert!(decode(&format!("{}A", "/".repeat(13))).is_err());
        assert!(decode(&"/".repeat(15)).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("A*").is_err());
        assert!(decode("g").is_err());
    }

    #[test]
    fn test_mapping_string_roundtrip() {
        let sources: IndexSet<String> = ["a.js".to_string(), "b.js".to_string()].into_iter().collect();
        let names: IndexSet<String> = ["foo".to_string()].into_iter().collect();
        let mappings = vec![
            Mapping::new(Position::new(1, 0), "a.js", Position::new(1, 0)),
            Mapping::new(Position::new(1, 8), "a.js", Position::new(1, 4)).with_name("foo"),
            Mapping::new(Position::new(3, 2), "b.js", Position::new(10, 0)),
        ];

        let encoded = encode_mappings(&mappings, &sources, &names, 0);
        assert_eq!(encoded.matches(';').count(), 2);

        let sources: Vec<_> = sources.into_iter().collect();
        let names: Vec<_> = names.into_iter().collect();
        let decoded = decode_mappings(&encoded, &sources, &names).unwrap();
        assert_eq!(decoded, mappings);
    }

    #[test]
    fn test_trailing_rows_are_emitted() {
        let encoded = encode_mappings(&[], &IndexSet::new(), &IndexSet::new(), 3);
        assert_eq!(encoded, ";;");
    }

    proptest! {
        #[test]
        fn property_mapping_positions_roundtrip(
            raw in proptest::collection::vec((1u32..50, 0u32..200, 1u32..500, 0u32..200), 0..40)
        ) {
            let mut mappings: Vec<Mapping> = raw
                .into_iter()
                .map(|(gl, gc, ol, oc)| Mapping::new(Position::new(gl, gc), "src.js", Position::new(ol, oc)))
                .collect();
            mappings.sort_by_key(|m| m.generated);
            mappings.dedup_by_key(|m| m.generated);

            let sources: IndexSet<String> = std::iter::once("src.js".to_string()).collect();
            let encoded = encode_mappings(&mappings, &sources, &IndexSet::new(), 0);
            let decoded = decode_mappings(&encoded, &["src.js".to_string()], &[]).unwrap();
            prop_assert_eq!(decoded, mappings);
        }
    }

    #[test]
    fn test_full_range_roundtrip() {
        for n in -100_000i64..=100_000 {
            assert_eq!(decode(&encode(&[n])).unwrap(), vec![n], "value {n}");
        }
    }
}
