//! MIME type tables and accept-list negotiation.
//!
//! Content types are kept bare (`text/css`, no `charset` parameter) because
//! they double as keys in the processor registry.

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html";
    pub const PLAIN: &str = "text/plain";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const SOURCE_MAP: &str = "application/json+sourcemap";
    pub const SVG: &str = "image/svg+xml";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const ICO: &str = "image/x-icon";
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Format extensions registered by default: `(extension, content type)`.
pub const DEFAULT_EXTENSIONS: &[(&str, &str)] = &[
    (".js", types::JAVASCRIPT),
    (".mjs", types::JAVASCRIPT),
    (".css", types::CSS),
    (".html", types::HTML),
    (".htm", types::HTML),
    (".txt", types::PLAIN),
    (".json", types::JSON),
    (".xml", types::XML),
    (".map", types::SOURCE_MAP),
    (".svg", types::SVG),
    (".png", types::PNG),
    (".jpg", types::JPEG),
    (".jpeg", types::JPEG),
    (".gif", types::GIF),
    (".webp", types::WEBP),
    (".ico", types::ICO),
    (".woff", types::WOFF),
    (".woff2", types::WOFF2),
    (".ttf", types::TTF),
];

/// Check if the MIME type represents text content.
pub fn is_text(mime: &str) -> bool {
    mime.starts_with("text/")
        || mime == types::JAVASCRIPT
        || mime == types::JSON
        || mime == types::XML
        || mime == types::SOURCE_MAP
        || mime == types::SVG
}

// ============================================================================
// Accept lists
// ============================================================================

/// One entry of an accept list (`text/css;q=0.8`).
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pub mime: String,
    pub quality: f32,
}

impl AcceptEntry {
    pub fn new(mime: impl Into<String>, quality: f32) -> Self {
        Self {
            mime: mime.into(),
            quality,
        }
    }

    /// Whether `content_type` satisfies this entry (`*/*` and `type/*` wildcards).
    pub fn matches(&self, content_type: &str) -> bool {
        mime_matches(&self.mime, content_type)
    }
}

/// Ordered accept list, highest quality first.
///
/// An empty list accepts everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accept(Vec<AcceptEntry>);

impl Accept {
    /// Accept everything.
    pub fn any() -> Self {
        Self(Vec::new())
    }

    /// Accept a single type at full quality.
    pub fn only(mime: &str) -> Self {
        Self(vec![AcceptEntry::new(mime, 1.0)])
    }

    /// Parse an RFC 7231 style list: `application/javascript, text/css;q=0.8`.
    ///
    /// Entries with unparsable or zero quality are dropped. The result is
    /// stable-sorted by descending quality, so listing order breaks ties.
    pub fn parse(header: &str) -> Self {
        let mut entries: Vec<AcceptEntry> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';').map(str::trim);
                let mime = pieces.next().filter(|m| !m.is_empty())?;
                let mut quality = 1.0f32;
                for param in pieces {
                    if let Some(q) = param.strip_prefix("q=") {
                        quality = q.trim().parse().ok()?;
                    }
                }
                (quality > 0.0).then(|| AcceptEntry::new(mime, quality.min(1.0)))
            })
            .collect();
        entries.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        Self(entries)
    }

    pub fn entries(&self) -> &[AcceptEntry] {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    /// Append an entry unless an identical type is already listed.
    pub fn push(&mut self, entry: AcceptEntry) {
        if !self.0.iter().any(|e| e.mime == entry.mime) {
            self.0.push(entry);
            self.0.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        }
    }

    /// Quality at which `content_type` is accepted, or `None` if rejected.
    pub fn quality_of(&self, content_type: &str) -> Option<f32> {
        if self.0.is_empty() {
            return Some(1.0);
        }
        self.0
            .iter()
            .filter(|e| e.matches(content_type))
            .map(|e| e.quality)
            .reduce(f32::max)
    }

    /// First concrete (wildcard-free) type, if any.
    pub fn preferred(&self) -> Option<&str> {
        self.0
            .iter()
            .map(|e| e.mime.as_str())
            .find(|m| !m.contains('*'))
    }
}

impl From<AcceptEntry> for Accept {
    fn from(entry: AcceptEntry) -> Self {
        Self(vec![entry])
    }
}

/// Match a pattern (`*/*`, `text/*`, `text/css`) against a content type.
pub fn mime_matches(pattern: &str, content_type: &str) -> bool {
    if pattern == "*/*" || pattern == "*" || pattern == content_type {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(major) => content_type
            .split_once('/')
            .is_some_and(|(ct_major, _)| ct_major == major),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text() {
        assert!(is_text(types::HTML));
        assert!(is_text(types::CSS));
        assert!(is_text(types::JAVASCRIPT));
        assert!(is_text(types::JSON));
        assert!(!is_text(types::PNG));
        assert!(!is_text(types::WOFF2));
    }

    #[test]
    fn test_mime_matches_wildcards() {
        assert!(mime_matches("*/*", "text/css"));
        assert!(mime_matches("text/*", "text/css"));
        assert!(!mime_matches("text/*", "application/javascript"));
        assert!(mime_matches("text/css", "text/css"));
        assert!(!mime_matches("text/css", "text/html"));
    }

    #[test]
    fn test_accept_parse_orders_by_quality() {
        let accept = Accept::parse("text/css;q=0.5, application/javascript, */*;q=0.1");
        let mimes: Vec<_> = accept.entries().iter().map(|e| e.mime.as_str()).collect();
        assert_eq!(mimes, ["application/javascript", "text/css", "*/*"]);
        assert_eq!(accept.quality_of("text/css"), Some(0.5));
        assert_eq!(accept.quality_of("image/png"), Some(0.1));
        assert_eq!(accept.preferred(), Some("application/javascript"));
    }

    #[test]
    fn test_accept_drops_zero_quality() {
        let accept = Accept::parse("text/css;q=0, text/html");
        assert_eq!(accept.quality_of("text/css"), None);
        assert_eq!(accept.quality_of("text/html"), Some(1.0));
    }

    #[test]
    fn test_empty_accept_matches_everything() {
        let accept = Accept::any();
        assert!(accept.is_any());
        assert_eq!(accept.quality_of("anything/at-all"), Some(1.0));
        assert_eq!(accept.preferred(), None);
    }
}
