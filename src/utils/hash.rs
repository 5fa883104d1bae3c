//! Content digests using blake3.
//!
//! [`Digest`] identifies file contents, asset bodies and cache keys.
//! [`DigestBuilder`] feeds structured parts with length prefixes so that
//! `["ab", "c"]` and `["a", "bc"]` never collide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Create a new Digest from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest of a byte slice.
    #[inline]
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create a hash representing "no content" (all zeros).
    #[inline]
    pub const fn empty() -> Self {
        Self([0; 32])
    }

    /// Check if this is the empty/zero hash.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Short fingerprint used in digest paths (`app-1a2b3c4d….js`).
    pub fn fingerprint(self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid digest hex"))
    }
}

/// Incremental digest over structured parts.
#[derive(Default)]
pub struct DigestBuilder {
    hasher: blake3::Hasher,
}

impl DigestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a length-prefixed byte part.
    pub fn part(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        let data = data.as_ref();
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    /// Feed another digest.
    pub fn digest(&mut self, digest: &Digest) -> &mut Self {
        self.part(digest.as_bytes())
    }

    pub fn finish(&self) -> Digest {
        Digest(*self.hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_display() {
        let hash = Digest::new([0xab; 32]);
        assert_eq!(format!("{}", hash), "abababababababab");
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let original = Digest::of("hello world");
        let recovered = Digest::from_hex(&original.to_hex()).unwrap();
        assert_eq!(original, recovered);
        assert!(Digest::from_hex("abcd").is_none());
    }

    #[test]
    fn test_builder_parts_do_not_collide() {
        let a = DigestBuilder::new().part("ab").part("c").finish();
        let b = DigestBuilder::new().part("a").part("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_serde_as_hex() {
        let digest = Digest::of("x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
