//! Build error taxonomy.
//!
//! Every caller-facing failure of resolution, directive expansion, processing
//! and caching is an [`AssetError`]. Expected misses (absent cache entries,
//! optional files) are `Option`s and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving or building an asset.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Resolved or required target does not exist.
    #[error("couldn't find file '{path}'{}", context_suffix(.context))]
    FileNotFound {
        path: String,
        /// File that issued the request (directive source), if any.
        context: Option<PathBuf>,
    },

    /// Absolute path or require target is not under any configured root.
    #[error("{} is outside of the configured roots: {}", .path.display(), display_roots(.roots))]
    FileOutsidePaths { path: PathBuf, roots: Vec<PathBuf> },

    /// Required file's content type is incompatible with the requiring bundle.
    #[error("{} is '{actual}', not '{expected}'", .path.display())]
    ContentTypeMismatch {
        path: PathBuf,
        actual: String,
        expected: String,
    },

    /// Malformed directive or argument.
    #[error("{directive}: {message} ({}:{line})", .file.display())]
    Argument {
        directive: String,
        message: String,
        file: PathBuf,
        line: usize,
    },

    /// No processor chain connects the source type to the requested type.
    #[error("no conversion from '{from}' to '{to}' for {}", .path.display())]
    Conversion {
        from: String,
        to: String,
        path: PathBuf,
    },

    /// Bytes unreadable under any supported text encoding.
    #[error("{} is not valid text: {message}", .path.display())]
    Encoding { path: PathBuf, message: String },

    /// A processor returned a value that breaks the metadata contract.
    #[error("processor '{processor}' returned an invalid result: {message}")]
    InvalidProcessorResult { processor: String, message: String },

    /// A processor failed on its own terms (compile error in a language stage).
    #[error("processor '{processor}' failed on {}: {message}", .path.display())]
    Processor {
        processor: String,
        path: PathBuf,
        message: String,
    },

    #[error("invalid asset uri '{0}'")]
    InvalidUri(String),

    #[error("invalid source map: {0}")]
    SourceMap(String),

    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = AssetError> = std::result::Result<T, E>;

impl AssetError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound {
            path: path.into(),
            context: None,
        }
    }

    /// Attach the requiring file to a not-found error.
    pub fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            Self::FileNotFound {
                path,
                context: None,
            } => Self::FileNotFound {
                path,
                context: Some(file.to_path_buf()),
            },
            other => other,
        }
    }

    /// Short machine-friendly kind name.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "file-not-found",
            Self::FileOutsidePaths { .. } => "file-outside-paths",
            Self::ContentTypeMismatch { .. } => "content-type-mismatch",
            Self::Argument { .. } => "argument",
            Self::Conversion { .. } => "conversion",
            Self::Encoding { .. } => "encoding",
            Self::InvalidProcessorResult { .. } => "invalid-processor-result",
            Self::Processor { .. } => "processor",
            Self::InvalidUri(_) => "invalid-uri",
            Self::SourceMap(_) => "source-map",
            Self::Io(..) => "io",
        }
    }
}

fn context_suffix(context: &Option<PathBuf>) -> String {
    context
        .as_ref()
        .map(|p| format!(" under '{}'", p.display()))
        .unwrap_or_default()
}

fn display_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AssetError::not_found("missing.js");
        assert_eq!(err.to_string(), "couldn't find file 'missing.js'");

        let err = err.in_file(std::path::Path::new("/app/application.js"));
        assert!(err.to_string().contains("under '/app/application.js'"));
        assert_eq!(err.kind(), "file-not-found");
    }

    #[test]
    fn test_outside_paths_display() {
        let err = AssetError::FileOutsidePaths {
            path: PathBuf::from("/etc/passwd"),
            roots: vec![PathBuf::from("/app/js"), PathBuf::from("/app/css")],
        };
        let display = err.to_string();
        assert!(display.contains("/etc/passwd"));
        assert!(display.contains("/app/js, /app/css"));
    }

    #[test]
    fn test_argument_display() {
        let err = AssetError::Argument {
            directive: "require_self".into(),
            message: "may only be used once".into(),
            file: PathBuf::from("/app/a.js"),
            line: 3,
        };
        assert_eq!(
            err.to_string(),
            "require_self: may only be used once (/app/a.js:3)"
        );
    }
}
