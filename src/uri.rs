//! Canonical asset identity.
//!
//! Wire form: `file://<percent-encoded absolute path>?type=<content type>&<params>`.
//! `type` always comes first, remaining parameters follow in lexical key
//! order, so equal URIs always render to equal strings. Drive-letter paths
//! render as `file://C:/...`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AssetError, Result};
use crate::utils::path::to_slash;

const SCHEME: &str = "file://";

/// Characters escaped in the path part.
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b':');

/// Characters escaped in query keys and values.
const QUERY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'+');

/// Well-known parameter names.
pub mod params {
    pub const TYPE: &str = "type";
    /// `self` for the single-file pipeline, absent for the full bundle.
    pub const PIPELINE: &str = "pipeline";
    pub const DIGEST: &str = "digest";
    pub const ETAG: &str = "etag";
    pub const ENCODING: &str = "encoding";
}

/// Dependency URIs recorded with cached results.
///
/// Each names something whose current digest decides whether a cached value
/// is still valid: file content, file stat, a directory listing, or the
/// environment version.
pub mod dependency {
    use std::path::{Path, PathBuf};

    use percent_encoding::utf8_percent_encode;

    use super::{PATH_SET, decode};
    use crate::utils::path::to_slash;

    pub const FILE_DIGEST: &str = "file-digest://";
    pub const FILE_STAT: &str = "file-stat://";
    pub const DIR_LISTING: &str = "dir-listing://";
    pub const ENV_VERSION: &str = "env-version:";

    /// Parsed dependency URI.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Dependency {
        FileDigest(PathBuf),
        FileStat(PathBuf),
        DirListing(PathBuf),
        EnvVersion,
    }

    fn with_path(scheme: &str, path: &Path) -> String {
        format!("{scheme}{}", utf8_percent_encode(&to_slash(path), PATH_SET))
    }

    /// Content digest of a file.
    pub fn file_digest(path: &Path) -> String {
        with_path(FILE_DIGEST, path)
    }

    /// Stat digest of a file (size, mtime, mode).
    pub fn file_stat(path: &Path) -> String {
        with_path(FILE_STAT, path)
    }

    /// Entry names of a directory.
    pub fn dir_listing(path: &Path) -> String {
        with_path(DIR_LISTING, path)
    }

    pub fn env_version() -> String {
        ENV_VERSION.to_string()
    }

    pub fn parse(uri: &str) -> Option<Dependency> {
        if uri == ENV_VERSION {
            return Some(Dependency::EnvVersion);
        }
        let (make, rest): (fn(PathBuf) -> Dependency, &str) =
            if let Some(rest) = uri.strip_prefix(FILE_DIGEST) {
                (Dependency::FileDigest, rest)
            } else if let Some(rest) = uri.strip_prefix(FILE_STAT) {
                (Dependency::FileStat, rest)
            } else if let Some(rest) = uri.strip_prefix(DIR_LISTING) {
                (Dependency::DirListing, rest)
            } else {
                return None;
            };
        decode(rest).map(|p| make(PathBuf::from(p)))
    }
}

/// Canonical identity of a source file rendered as a given content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUri {
    path: String,
    content_type: Option<String>,
    params: BTreeMap<String, String>,
}

impl AssetUri {
    /// Build a URI for an absolute path.
    ///
    /// The path is stored in forward-slash form.
    pub fn new(path: &Path, content_type: Option<&str>) -> Self {
        Self {
            path: to_slash(path),
            content_type: content_type.map(str::to_string),
            params: BTreeMap::new(),
        }
    }

    /// Add or replace a parameter. A `type` key sets the content type.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if key == params::TYPE {
            self.content_type = Some(value);
        } else {
            self.params.insert(key.to_string(), value);
        }
        self
    }

    /// Copy of this URI with a different content type.
    pub fn with_type(&self, content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            ..self.clone()
        }
    }

    /// Copy of this URI without a parameter.
    pub fn without_param(&self, key: &str) -> Self {
        let mut uri = self.clone();
        uri.params.remove(key);
        uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Whether this URI names the single-file (`pipeline=self`) rendition.
    pub fn is_self_pipeline(&self) -> bool {
        self.param(params::PIPELINE) == Some("self")
    }

    /// Render the wire form.
    pub fn build(&self) -> String {
        let mut out = String::with_capacity(SCHEME.len() + self.path.len() + 32);
        out.push_str(SCHEME);
        out.extend(utf8_percent_encode(&self.path, PATH_SET));

        let mut query = self
            .content_type
            .iter()
            .map(|t| (params::TYPE, t.as_str()))
            .chain(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .peekable();

        if query.peek().is_some() {
            out.push('?');
        }
        let mut first = true;
        for (key, value) in query {
            if !first {
                out.push('&');
            }
            first = false;
            out.extend(utf8_percent_encode(key, QUERY_SET));
            out.push('=');
            out.extend(utf8_percent_encode(value, QUERY_SET));
        }
        out
    }

    /// Parse the wire form produced by [`AssetUri::build`].
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || AssetError::InvalidUri(input.to_string());

        let rest = input.strip_prefix(SCHEME).ok_or_else(invalid)?;
        let (raw_path, raw_query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let path = decode(raw_path).ok_or_else(invalid)?;
        if !is_absolute_form(&path) {
            return Err(invalid());
        }

        let mut uri = Self {
            path,
            content_type: None,
            params: BTreeMap::new(),
        };

        for pair in raw_query.into_iter().flat_map(|q| q.split('&')) {
            let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
            let key = decode(key).filter(|k| !k.is_empty()).ok_or_else(invalid)?;
            let value = decode(value).ok_or_else(invalid)?;
            uri = uri.with_param(&key, value);
        }

        Ok(uri)
    }
}

/// `/unix/path` or `C:/drive/path`.
fn is_absolute_form(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/')
}

fn decode(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

impl fmt::Display for AssetUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

impl FromStr for AssetUri {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for AssetUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.build())
    }
}

impl<'de> Deserialize<'de> for AssetUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
