//! Bundle compressors for JS and CSS.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Neither emits a source
//! map here, so each reports an empty map for its output and the bundle map
//! ends up empty rather than stale.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::metadata::{CacheKey, Metadata, keys};
use super::{Input, Output, Processor};
use crate::error::{AssetError, Result};
use crate::sourcemap::SourceMap;

/// Minify JavaScript source code.
fn minify_js(source: &str) -> std::result::Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(err) = ret.errors.first() {
        return Err(err.to_string());
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
fn minify_css(source: &str) -> std::result::Result<String, String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(result.code)
}

fn compressed(name: &str, input: &Input, result: std::result::Result<String, String>) -> Result<Output> {
    let data = result.map_err(|message| AssetError::Processor {
        processor: name.to_string(),
        path: input.source_path.clone(),
        message,
    })?;
    let mut metadata = Metadata::new();
    metadata.insert(keys::MAP.into(), SourceMap::blank(&data).into());
    Ok(Output::Record { data, metadata })
}

/// `application/javascript` compressor (`[build.compress] javascript = "oxc"`).
pub struct JsMinifier;

impl Processor for JsMinifier {
    fn name(&self) -> &str {
        "oxc"
    }

    fn process(&self, input: &Input) -> Result<Output> {
        compressed(self.name(), input, minify_js(&input.data))
    }

    fn cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::str("oxc-minifier:smallest"))
    }
}

/// `text/css` compressor (`[build.compress] css = "lightningcss"`).
pub struct CssMinifier;

impl Processor for CssMinifier {
    fn name(&self) -> &str {
        "lightningcss"
    }

    fn process(&self, input: &Input) -> Result<Output> {
        compressed(self.name(), input, minify_css(&input.data))
    }

    fn cache_key(&self) -> Option<CacheKey> {
        Some(CacheKey::str("lightningcss:minify"))
    }
}
