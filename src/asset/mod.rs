//! Built assets.
//!
//! An [`Asset`] is immutable once built and shared between callers and the
//! cache. Its digest depends on the body only, never on paths or mtimes.

mod builder;
mod bundle;

pub use builder::AssetBuilder;
pub use bundle::{Part, concatenate};

use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::sourcemap::SourceMap;
use crate::uri::{AssetUri, dependency};
use crate::utils::hash::Digest;

/// Asset content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum Body {
    Text(String),
    Binary(#[serde(with = "hex::serde")] Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub uri: AssetUri,
    pub logical_path: String,
    pub content_type: String,
    pub digest: Digest,
    pub length: usize,
    pub body: Body,
    /// Files inlined into the body, in bundle order.
    pub constituents: Vec<AssetUri>,
    pub source_map: SourceMap,
    /// Dependency URIs whose digests decide whether this asset is fresh.
    pub dependencies: IndexSet<String>,
    /// Assets referenced but not inlined.
    pub links: IndexSet<String>,
    /// Latest modification time (seconds) among the inlined files.
    pub mtime: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
}

impl Asset {
    pub fn new(uri: AssetUri, logical_path: String, content_type: String, body: Body) -> Self {
        let digest = Digest::of(body.as_bytes());
        Self {
            uri,
            logical_path,
            content_type,
            digest,
            length: body.len(),
            body,
            constituents: Vec::new(),
            source_map: SourceMap::default(),
            dependencies: IndexSet::new(),
            links: IndexSet::new(),
            mtime: 0,
            charset: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.body.as_text()
    }

    pub fn bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    pub fn hexdigest(&self) -> String {
        self.digest.to_hex()
    }

    /// Logical path with the digest before the extension: `app-<hex>.js`.
    pub fn digest_path(&self) -> String {
        digest_path(&self.logical_path, &self.digest)
    }

    /// Files this asset's freshness depends on, in recording order.
    pub fn dependency_paths(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .filter_map(|uri| match dependency::parse(uri)? {
                dependency::Dependency::FileDigest(path) | dependency::Dependency::FileStat(path) => {
                    Some(path.to_string_lossy().into_owned())
                }
                _ => None,
            })
            .collect()
    }

    pub fn descriptor(&self) -> ArtifactDescriptor {
        ArtifactDescriptor {
            logical_path: self.logical_path.clone(),
            digest_path: self.digest_path(),
            content_type: self.content_type.clone(),
            size: self.length,
            digest: self.hexdigest(),
            mtime: self.mtime,
            dependencies: self.dependency_paths(),
            links: self.links.iter().cloned().collect(),
        }
    }
}

/// Insert `-<hex digest>` before the final extension of `logical_path`.
pub fn digest_path(logical_path: &str, digest: &Digest) -> String {
    let hex = digest.to_hex();
    let (dir, file) = match logical_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, logical_path),
    };
    let file = match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some(ext) if file.len() > ext.len() + 1 => {
            let stem = &file[..file.len() - ext.len() - 1];
            format!("{stem}-{hex}.{ext}")
        }
        _ => format!("{file}-{hex}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

/// Serializable summary of a built asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub logical_path: String,
    pub digest_path: String,
    pub content_type: String,
    pub size: usize,
    pub digest: String,
    pub mtime: u64,
    pub dependencies: Vec<String>,
    pub links: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(body: &str) -> Asset {
        Asset::new(
            AssetUri::new(Path::new("/app/js/app.js"), Some("application/javascript")),
            "js/app.js".into(),
            "application/javascript".into(),
            Body::Text(body.into()),
        )
    }

    #[test]
    fn test_digest_is_body_only() {
        let a = asset("var a;");
        let mut b = asset("var a;");
        b.mtime = 99;
        b.logical_path = "other.js".into();
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, asset("var b;").digest);
        assert_eq!(a.length, 6);
    }

    #[test]
    fn test_digest_path() {
        let d = Digest::of("x");
        let hex = d.to_hex();
        assert_eq!(digest_path("app.js", &d), format!("app-{hex}.js"));
        assert_eq!(digest_path("js/jquery.min.js", &d), format!("js/jquery.min-{hex}.js"));
        assert_eq!(digest_path("LICENSE", &d), format!("LICENSE-{hex}"));
        assert_eq!(digest_path(".hidden", &d), format!(".hidden-{hex}"));
    }

    #[test]
    fn test_descriptor() {
        let mut a = asset("1");
        a.dependencies.insert(dependency::file_digest(Path::new("/app/js/app.js")));
        a.dependencies.insert(dependency::dir_listing(Path::new("/app/js")));
        a.dependencies.insert(dependency::env_version());
        a.links.insert("file:///app/logo.png?type=image/png".into());

        let d = a.descriptor();
        assert_eq!(d.dependencies, ["/app/js/app.js"]);
        assert_eq!(d.size, 1);
        assert!(d.digest_path.starts_with("js/app-"));
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"logical_path\":\"js/app.js\""));
    }

    #[test]
    fn test_binary_body_serde() {
        let a = Asset::new(
            AssetUri::new(Path::new("/app/logo.png"), Some("image/png")),
            "logo.png".into(),
            "image/png".into(),
            Body::Binary(vec![0x89, 0x50, 0x4e, 0x47]),
        );
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("89504e47"));
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert_eq!(back.text(), None);
    }
}
