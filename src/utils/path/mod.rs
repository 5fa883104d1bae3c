//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects apart from
//! `normalize_path`, which may canonicalize through the filesystem.

pub mod fs;

pub use fs::{clean_path, is_relative_arg, is_within, normalize_path, to_slash};
