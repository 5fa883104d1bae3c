//! Composition and concatenation of source maps.

use super::{Mapping, Position, SourceMap};

/// Compose two transforms.
///
/// `first` maps text B back to sources A, `second` maps text C back to B.
/// The result maps C back to A. Each mapping of `second` is traced through
/// the nearest preceding mapping of `first` on the same line; mappings that
/// land nowhere are dropped. An empty `first` means B has no finer origin,
/// so `second` is returned unchanged.
pub fn combine(first: &SourceMap, second: &SourceMap) -> SourceMap {
    if first.is_empty() {
        return second.clone();
    }

    let mappings = second
        .mappings()
        .iter()
        .filter_map(|m| {
            let origin = first.lookup(m.original)?;
            Some(Mapping {
                generated: m.generated,
                source: origin.source.clone(),
                original: origin.original,
                name: origin.name.clone().or_else(|| m.name.clone()),
            })
        })
        .collect();

    let mut combined = SourceMap::new(mappings, second.extent);
    combined.file = second.file.clone().or_else(|| first.file.clone());
    combined
}

/// Append `b` after `a`.
///
/// Mappings of `b` shift down by the line count of `a`; those on `b`'s first
/// line also shift right by the width of `a`'s last line.
pub fn concat(a: &SourceMap, b: &SourceMap) -> SourceMap {
    let lines = a.extent.lines;
    let column = a.extent.column;

    let shifted = b.mappings().iter().map(|m| {
        let generated = if m.generated.line == 1 {
            Position::new(1 + lines, m.generated.column + column)
        } else {
            Position::new(m.generated.line + lines, m.generated.column)
        };
        Mapping {
            generated,
            ..m.clone()
        }
    });

    let mappings = a.mappings().iter().cloned().chain(shifted).collect();
    let mut joined = SourceMap::new(mappings, a.extent.then(b.extent));
    joined.file = a.file.clone();
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::Extent;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(line, column)
    }

    #[test]
    fn test_combine_traces_through_first() {
        // coffee → js: js line 2 came from coffee line 1
        let first = SourceMap::new(
            vec![
                Mapping::new(pos(1, 0), "app.coffee", pos(1, 0)),
                Mapping::new(pos(2, 0), "app.coffee", pos(1, 0)).with_name("square"),
                Mapping::new(pos(3, 0), "app.coffee", pos(4, 2)),
            ],
            Extent::of("a\nb\nc\n"),
        );
        // minifier: everything on one line
        let second = SourceMap::new(
            vec![
                Mapping::new(pos(1, 0), "app.js", pos(1, 0)),
                Mapping::new(pos(1, 5), "app.js", pos(2, 3)),
                Mapping::new(pos(1, 9), "app.js", pos(3, 0)),
            ],
            Extent::of("abcdefghij"),
        );

        let combined = combine(&first, &second);
        let got: Vec<_> = combined
            .mappings()
            .iter()
            .map(|m| (m.generated, m.source.as_str(), m.original, m.name.as_deref()))
            .collect();
        assert_eq!(
            got,
            vec![
                (pos(1, 0), "app.coffee", pos(1, 0), None),
                (pos(1, 5), "app.coffee", pos(1, 0), Some("square")),
                (pos(1, 9), "app.coffee", pos(4, 2), None),
            ]
        );
        assert_eq!(combined.extent, second.extent);
    }

    #[test]
    fn test_combine_drops_untraceable_mappings() {
        let first = SourceMap::new(
            vec![Mapping::new(pos(2, 4), "a.js", pos(9, 0))],
            Extent::of("x\ny"),
        );
        let second = SourceMap::new(
            vec![
                Mapping::new(pos(1, 0), "b.js", pos(1, 0)),
                Mapping::new(pos(2, 0), "b.js", pos(2, 6)),
            ],
            Extent::of("x\ny"),
        );
        let combined = combine(&first, &second);
        assert_eq!(combined.mappings().len(), 1);
        assert_eq!(combined.mappings()[0].generated, pos(2, 0));
        assert_eq!(combined.mappings()[0].original, pos(9, 0));
    }

    #[test]
    fn test_combine_with_empty_first_keeps_second() {
        let second = SourceMap::identity("a.js", "one\ntwo\n");
        assert_eq!(combine(&SourceMap::default(), &second), second);
    }

    #[test]
    fn test_combine_identity_is_neutral() {
        let map = SourceMap::new(
            vec![
                Mapping::new(pos(1, 0), "src.ts", pos(3, 0)),
                Mapping::new(pos(2, 0), "src.ts", pos(5, 1)),
            ],
            Extent::of("a\nb\n"),
        );
        let identity = SourceMap::identity("out.js", "a\nb\n");
        assert_eq!(combine(&map, &identity).mappings(), map.mappings());
    }

    #[test]
    fn test_concat_shifts_lines() {
        let a = SourceMap::identity("a.js", "var a;\nvar b;\n");
        let b = SourceMap::identity("b.js", "var c;\n");
        let joined = concat(&a, &b);

        assert_eq!(joined.mappings().len(), 3);
        assert_eq!(joined.mappings()[2].generated, pos(3, 0));
        assert_eq!(joined.mappings()[2].source, "b.js");
        assert_eq!(joined.mappings()[2].original, pos(1, 0));
        assert_eq!(joined.extent, Extent::of("var a;\nvar b;\nvar c;\n"));
        assert_eq!(joined.encode_mappings(), "AAAA;AACA;ACDA;");
    }

    #[test]
    fn test_concat_shifts_first_line_columns() {
        let a = SourceMap::identity("a.js", "var a;");
        let b = SourceMap::new(
            vec![
                Mapping::new(pos(1, 2), "b.js", pos(1, 0)),
                Mapping::new(pos(2, 2), "b.js", pos(2, 0)),
            ],
            Extent::of("xxxx\nyyyy"),
        );
        let joined = concat(&a, &b);
        assert_eq!(joined.mappings()[1].generated, pos(1, 8));
        assert_eq!(joined.mappings()[2].generated, pos(2, 2));
        assert_eq!(joined.extent, Extent { lines: 1, column: 4 });
    }

    #[test]
    fn test_concat_deduplicates_sources_on_encode() {
        let a = SourceMap::identity("a.js", "x\n");
        let b = SourceMap::identity("a.js", "y\n");
        let joined = concat(&concat(&a, &SourceMap::blank("\n")), &b);
        assert_eq!(joined.sources().len(), 1);
        assert_eq!(joined.extent.lines, 3);
        assert_eq!(joined.mappings()[1].generated, pos(3, 0));
    }
}
