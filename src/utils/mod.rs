//! Shared helpers: digests, MIME tables, paths, text decoding.

pub mod encoding;
pub mod hash;
pub mod mime;
pub mod path;
