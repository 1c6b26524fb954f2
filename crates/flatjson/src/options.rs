//! Build configuration.

/// Encoding of the string blob in a built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// UTF-8, NUL-terminated. Zero-copy `&str` access.
    #[default]
    Utf8,
    /// 16-bit code units (host byte order) with surrogate pair synthesis
    /// for code points above U+FFFF, terminated by a 16-bit zero.
    Utf16,
}

/// Options controlling [`build_with_options`](crate::build_with_options).
///
/// The defaults accept the common real-world deviations from strict JSON:
/// a UTF-8 BOM, C-style comments, a root-level array, and UTF-16 surrogate
/// pair escapes.
///
/// # Example
///
/// ```
/// use flatjson::{BuildOptions, build_with_options};
///
/// let options = BuildOptions::new().with_comments(false).with_max_depth(32);
/// let tree = build_with_options(br#"{"a": 1}"#, &options).unwrap();
/// assert_eq!(tree.root().child_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub(crate) utf8_bom: bool,
    pub(crate) comments: bool,
    pub(crate) root_array: bool,
    pub(crate) surrogate_pairs: bool,
    pub(crate) store_key_names: bool,
    pub(crate) encoding: StringEncoding,
    pub(crate) max_depth: usize,
    pub(crate) max_context: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            utf8_bom: true,
            comments: true,
            root_array: true,
            surrogate_pairs: true,
            store_key_names: true,
            encoding: StringEncoding::Utf8,
            max_depth: 256,
            max_context: 256,
        }
    }
}

impl BuildOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a leading UTF-8 byte order mark.
    #[must_use]
    pub fn with_utf8_bom(mut self, enabled: bool) -> Self {
        self.utf8_bom = enabled;
        self
    }

    /// Treat C-style `//` and `/* */` comments as whitespace.
    #[must_use]
    pub fn with_comments(mut self, enabled: bool) -> Self {
        self.comments = enabled;
        self
    }

    /// Accept `[` as the outermost token; the root item becomes an array.
    #[must_use]
    pub fn with_root_array(mut self, enabled: bool) -> Self {
        self.root_array = enabled;
        self
    }

    /// Combine `\uD800`..`\uDBFF` followed by `\uDC00`..`\uDFFF` into a
    /// single supplementary-plane code point.
    #[must_use]
    pub fn with_surrogate_pairs(mut self, enabled: bool) -> Self {
        self.surrogate_pairs = enabled;
        self
    }

    /// Keep key strings in the blob. When disabled only the 32-bit key
    /// hash is retained and [`ItemRef::name`](crate::ItemRef::name)
    /// returns `None`.
    #[must_use]
    pub fn with_key_names(mut self, enabled: bool) -> Self {
        self.store_key_names = enabled;
        self
    }

    /// Select the string blob encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: StringEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Maximum hierarchy depth (default 256).
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Maximum parse context depth (default 256).
    #[must_use]
    pub fn with_max_context(mut self, depth: usize) -> Self {
        self.max_context = depth.max(2);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = BuildOptions::default();
        assert!(o.utf8_bom && o.comments && o.root_array && o.surrogate_pairs);
        assert!(o.store_key_names);
        assert_eq!(o.encoding, StringEncoding::Utf8);
        assert_eq!(o.max_depth, 256);
        assert_eq!(o.max_context, 256);
    }

    #[test]
    fn test_builder_chain() {
        let o = BuildOptions::new()
            .with_comments(false)
            .with_encoding(StringEncoding::Utf16)
            .with_max_depth(0);
        assert!(!o.comments);
        assert_eq!(o.encoding, StringEncoding::Utf16);
        assert_eq!(o.max_depth, 1);
    }
}
