//! Processors shipped with the default registry.

use std::sync::LazyLock;

use regex::Regex;

use super::metadata::{CacheKey, Metadata, keys};
use super::{Input, Output, Processor};
use crate::directive::header::{self, CommentSyntax};
use crate::error::Result;
use crate::sourcemap::{Extent, Mapping, Position, SourceMap};

// ============================================================================
// FnProcessor
// ============================================================================

type ProcessFn = dyn Fn(&Input) -> Result<Output> + Send + Sync;

/// Closure adapter.
///
/// A closure has no identity of its own, so the cache key must be given
/// explicitly when results should survive a restart.
pub struct FnProcessor {
    name: String,
    f: Box<ProcessFn>,
    key: Option<CacheKey>,
}

impl FnProcessor {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Input) -> Result<Output> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
            key: None,
        }
    }

    pub fn with_cache_key(mut self, key: CacheKey) -> Self {
        self.key = Some(key);
        self
    }
}

impl Processor for FnProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, input: &Input) -> Result<Output> {
        (self.f)(input)
    }

    fn cache_key(&self) -> Option<CacheKey> {
        self.key.clone()
    }
}

// ============================================================================
// DirectiveProcessor
// ============================================================================

/// Strips directive lines from the header, leaving empty lines in place.
///
/// Expansion of the directives themselves happens in the graph walk; this
/// stage only keeps them out of the output.
pub struct DirectiveProcessor {
    syntax: CommentSyntax,
}

impl DirectiveProcessor {
    pub fn new(syntax: CommentSyntax) -> Self {
        Self { syntax }
    }
}

impl Processor for DirectiveProcessor {
    fn name(&self) -> &str {
        "directives"
    }

    fn process(&self, input: &Input) -> Result<Output> {
        let parsed = header::parse(&input.data, &self.syntax, &input.source_path)?;
        if parsed.directives.is_empty() {
            return Ok(Output::Data(input.data.clone()));
        }
        Ok(Output::Data(parsed.body))
    }

    fn cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::List(vec![
            CacheKey::str("directives"),
            CacheKey::Int(1),
            CacheKey::str(self.syntax.to_string()),
        ]))
    }
}

// ============================================================================
// CharsetNormalizer
// ============================================================================

static CHARSET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@charset\s+["']([^"']*)["']\s*;\s*$"#).expect("valid charset regex")
});

/// Hoists a single `@charset` rule to the top of a CSS bundle.
///
/// Concatenated stylesheets may each declare a charset; only the first
/// declaration is kept and it moves to line 1. Line moves are reported as a
/// source map so bundle maps stay accurate.
pub struct CharsetNormalizer;

impl Processor for CharsetNormalizer {
    fn name(&self) -> &str {
        "charset"
    }

    fn process(&self, input: &Input) -> Result<Output> {
        let mut charset: Option<(usize, &str, String)> = None;
        let mut kept: Vec<(usize, &str)> = Vec::new();
        let mut found = 0usize;

        for (idx, line) in input.data.split_inclusive('\n').enumerate() {
            match CHARSET_LINE.captures(line.trim_end_matches(['\r', '\n'])) {
                Some(caps) => {
                    found += 1;
                    if charset.is_none() {
                        charset = Some((idx + 1, line, caps[1].to_string()));
                    }
                }
                None => kept.push((idx + 1, line)),
            }
        }

        let Some((charset_line, rule, name)) = charset else {
            return Ok(Output::Data(input.data.clone()));
        };
        if charset_line == 1 && found == 1 {
            return Ok(Output::Data(input.data.clone()));
        }

        let mut data = String::with_capacity(input.data.len());
        data.push_str(rule);
        if !rule.ends_with('\n') {
            data.push('\n');
        }
        let mut mappings = vec![Mapping::new(
            Position::new(1, 0),
            input.logical_path.as_str(),
            Position::new(charset_line as u32, 0),
        )];
        for (out_line, (in_line, line)) in kept.into_iter().enumerate() {
            data.push_str(line);
            mappings.push(Mapping::new(
                Position::new(out_line as u32 + 2, 0),
                input.logical_path.as_str(),
                Position::new(in_line as u32, 0),
            ));
        }

        let mut metadata = Metadata::new();
        metadata.insert(keys::CHARSET.into(), name.to_ascii_lowercase().as_str().into());
        metadata.insert(
            keys::MAP.into(),
            SourceMap::new(mappings, Extent::of(&data)).into(),
        );
        Ok(Output::Record { data, metadata })
    }

    fn cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::List(vec![CacheKey::str("charset"), CacheKey::Int(1)]))
    }
}
