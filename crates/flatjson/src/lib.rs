//! # flatjson
//!
//! Flat, relocatable binary JSON trees, plus a streaming JSON text
//! writer.
//!
//! [`build`] parses JSON text into a single contiguous allocation: a
//! depth-first flat array of fixed-size items followed by a deduplicated
//! string blob. All internal references are index- or self-relative, so
//! the image can be written to disk and reloaded at any address with no
//! fixup ([`Tree::as_bytes`] / [`Tree::from_bytes`]). Reading never
//! allocates; a built tree is immutable and freely shared across
//! threads.
//!
//! ```
//! use flatjson::{build, ItemType};
//!
//! let tree = build(br#"{"name": "box", "size": [4, 2], "solid": true}"#).unwrap();
//! let root = tree.root();
//! assert_eq!(root.child_count(), 3);
//! assert_eq!(root.find("name").unwrap().as_str(), Some("box"));
//!
//! let size = root.find("size").unwrap();
//! assert_eq!(size.item_type(), ItemType::Array);
//! let dims: Vec<_> = size.children().map(|c| c.as_int().unwrap()).collect();
//! assert_eq!(dims, [4, 2]);
//! ```
//!
//! Going the other way, [`JsonWriter`] emits indented JSON through a
//! small fixed buffer, and [`export::write_tree`] regenerates the text
//! form of a parsed tree:
//!
//! ```
//! use flatjson::{build, export};
//!
//! let tree = build(br#"{"a": [1, 2.5, null]}"#).unwrap();
//! let text = export::to_json_string(&tree).unwrap();
//! assert_eq!(text, "{\n  \"a\" : [ 1, 2.5, null ]\n}\n");
//! ```
//!
//! ## Input extensions
//!
//! [`BuildOptions`] toggles the accepted deviations from strict JSON: a
//! leading UTF-8 BOM, C-style comments, a root-level array and UTF-16
//! surrogate pair escapes (all on by default), plus the string blob
//! encoding, hash-only keys, and the depth limits.
//!
//! ## Value widths
//!
//! Numbers are stored as `i64`/`f64`. The `narrow-values` feature
//! switches the [`Int`]/[`Float`] aliases to `i32`/`f32`; literals
//! outside the configured width fail the build with
//! [`ErrorKind::Unrepresentable`].

pub mod error;
pub mod export;
pub mod fnv;
mod intern;
pub mod item;
mod number;
pub mod options;
mod parser;
mod text;
pub mod tree;
pub mod writer;

pub use error::{Error, ErrorKind, Result, WriteError};
pub use fnv::fnv1a;
pub use item::{Children, ItemRef, ItemType, ItemValue};
pub use number::{format_float, format_float32};
pub use options::{BuildOptions, StringEncoding};
pub use tree::{BuildStats, Tree};
pub use writer::JsonWriter;

/// Integer value type (`i64`, or `i32` with the `narrow-values`
/// feature).
#[cfg(not(feature = "narrow-values"))]
pub type Int = i64;
/// Float value type (`f64`, or `f32` with the `narrow-values` feature).
#[cfg(not(feature = "narrow-values"))]
pub type Float = f64;

#[cfg(feature = "narrow-values")]
pub type Int = i32;
#[cfg(feature = "narrow-values")]
pub type Float = f32;

/// Parse JSON text into a flat binary tree with default options.
///
/// # Errors
///
/// Fails fast at the first offending token; the returned [`Error`]
/// carries the classified kind plus the 1-based line and column.
pub fn build(json: &[u8]) -> Result<Tree> {
    parser::build_tree(json, &BuildOptions::default())
}

/// Parse JSON text into a flat binary tree.
///
/// # Errors
///
/// See [`build`].
pub fn build_with_options(json: &[u8], options: &BuildOptions) -> Result<Tree> {
    parser::build_tree(json, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_traverse() {
        let tree = build(br#"{"a": 1, "b": {"c": [true]}}"#).unwrap();
        let b = tree.root().find("b").unwrap();
        let c = b.find("c").unwrap();
        assert_eq!(c.item_type(), ItemType::Array);
        assert_eq!(c.first_child().unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tree>();
    }

    #[test]
    fn test_stats() {
        let input = br#"{"k": "v", "k2": "v"}"#;
        let tree = build(input).unwrap();
        let stats = tree.stats();
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.bytes_read as usize, input.len());
        assert_eq!(stats.total_bytes as usize, tree.as_bytes().len());
        assert_eq!(stats.string_occurrences, 4);
        assert_eq!(stats.unique_strings, 3); // "k", "v", "k2"
    }
}
