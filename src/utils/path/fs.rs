//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `clean_path` - lexical `.`/`..` removal without touching the disk
//! - `to_slash` - forward-slash string form used in URIs and logical paths

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Lexically cleaned path if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            clean_path(path)
        } else {
            std::env::current_dir()
                .map_or_else(|_| path.to_path_buf(), |cwd| clean_path(&cwd.join(path)))
        }
    })
}

/// Remove `.` and resolve `..` components lexically.
///
/// `..` at the root is dropped, so the result never climbs above it.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let climbs = matches!(out.components().next_back(), Some(Component::ParentDir));
                if climbs || (!out.pop() && !out.has_root()) {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Whether `path` lies under `root` after lexical cleaning.
pub fn is_within(path: &Path, root: &Path) -> bool {
    clean_path(path).starts_with(clean_path(root))
}

/// Whether a directive argument is an explicit relative path (`.`, `./x`, `../x`).
pub fn is_relative_arg(arg: &str) -> bool {
    arg == "." || arg == ".." || arg.starts_with("./") || arg.starts_with("../")
}

/// Forward-slash string form of a path.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
