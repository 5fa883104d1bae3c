//! Directive header parsing.
//!
//! The header is the leading run of comments and blank lines. Inside it, a
//! line such as `//= require foo` or ` *= require_tree .` is a directive
//! when its name is known. The parsed body is the source with every
//! directive line emptied, so line numbers stay where they were.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AssetError, Result};

/// Directive names understood by the graph walk.
pub const DIRECTIVES: &[&str] = &[
    "require",
    "require_self",
    "require_directory",
    "require_tree",
    "depend_on",
    "depend_on_asset",
    "stub",
    "link",
    "link_directory",
    "link_tree",
];

static DIRECTIVE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\W*=\s*(\w+.*?)(\*/)?\s*$").unwrap());

/// Comment markers recognized in a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSyntax {
    pub line: Vec<String>,
    pub block: Vec<(String, String)>,
}

impl CommentSyntax {
    /// `//` and `/* */` (JavaScript, CSS, Sass).
    pub fn c_like() -> Self {
        Self {
            line: vec!["//".into()],
            block: vec![("/*".into(), "*/".into())],
        }
    }

    /// `#` and `### ###` (CoffeeScript and friends).
    pub fn hash() -> Self {
        Self {
            line: vec!["#".into()],
            block: vec![("###".into(), "###".into())],
        }
    }

    fn block_start(&self, line: &str) -> Option<(&str, &str)> {
        self.block
            .iter()
            .find(|(start, _)| line.starts_with(start.as_str()))
            .map(|(start, end)| (start.as_str(), end.as_str()))
    }

    fn is_line_comment(&self, line: &str) -> bool {
        self.line.iter().any(|m| line.starts_with(m.as_str()))
    }

    /// Scan `text` for the `end` of an open block comment.
    ///
    /// Returns `None` when code follows a closing marker on the same line,
    /// otherwise the block still open at the end of the line (if any).
    fn close_block<'s>(&'s self, mut text: &str, mut end: &'s str) -> Option<Option<&'s str>> {
        loop {
            let Some(pos) = text.find(end) else {
                return Some(Some(end));
            };
            let rest = text[pos + end.len()..].trim_start();
            if rest.is_empty() {
                return Some(None);
            }
            if let Some((start, next_end)) = self.block_start(rest) {
                text = &rest[start.len()..];
                end = next_end;
            } else if self.is_line_comment(rest) {
                return Some(None);
            } else {
                return None;
            }
        }
    }
}

impl fmt::Display for CommentSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for marker in &self.line {
            write!(f, "{marker} ")?;
        }
        for (start, end) in &self.block {
            write!(f, "{start}{end} ")?;
        }
        Ok(())
    }
}

/// One directive occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// 1-based line in the source.
    pub line: usize,
    pub name: String,
    pub args: Vec<String>,
}

/// Result of [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub directives: Vec<Directive>,
    /// Source with directive lines emptied.
    pub body: String,
}

/// Parse the header of `source` using `syntax`.
///
/// Fails only on unbalanced quoting in directive arguments.
pub fn parse(source: &str, syntax: &CommentSyntax, path: &Path) -> Result<Header> {
    let mut directives = Vec::new();
    let mut body = String::with_capacity(source.len());
    let mut in_block: Option<&str> = None;
    let mut in_header = true;

    for (idx, raw) in source.split_inclusive('\n').enumerate() {
        if !in_header {
            body.push_str(raw);
            continue;
        }

        let content = raw.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim();

        let is_header = if let Some(end) = in_block {
            match syntax.close_block(trimmed, end) {
                Some(open) => {
                    in_block = open;
                    true
                }
                None => false,
            }
        } else if trimmed.is_empty() {
            true
        } else if let Some((start, end)) = syntax.block_start(trimmed) {
            match syntax.close_block(&trimmed[start.len()..], end) {
                Some(open) => {
                    in_block = open;
                    true
                }
                None => false,
            }
        } else {
            syntax.is_line_comment(trimmed)
        };

        if !is_header {
            in_header = false;
            body.push_str(raw);
            continue;
        }

        match directive_of(content, idx + 1, path)? {
            Some(directive) => {
                directives.push(directive);
                body.push_str(&raw[content.len()..]);
            }
            None => body.push_str(raw),
        }
    }

    Ok(Header { directives, body })
}

fn directive_of(line: &str, number: usize, path: &Path) -> Result<Option<Directive>> {
    let Some(caps) = DIRECTIVE_LINE.captures(line) else {
        return Ok(None);
    };
    let text = caps[1].trim();
    let (name, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    if !DIRECTIVES.contains(&name) {
        return Ok(None);
    }
    let args = shlex::split(rest).ok_or_else(|| AssetError::Argument {
        directive: name.to_string(),
        message: "unbalanced quotes in arguments".into(),
        file: path.to_path_buf(),
        line: number,
    })?;
    Ok(Some(Directive {
        line: number,
        name: name.to_string(),
        args,
    }))
}
