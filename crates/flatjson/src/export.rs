//! Regenerating JSON text from a built tree.
//!
//! [`write_tree`] walks the flat array with an explicit stack (no
//! recursion) and drives a [`JsonWriter`], reproducing the document in
//! the same order it was parsed. [`to_serde_value`] converts a tree to a
//! [`serde_json::Value`] for interop and for structural comparison in
//! tests.

use crate::error::WriteError;
use crate::item::{ItemRef, ItemType};
use crate::tree::Tree;
use crate::writer::JsonWriter;
use serde_json::Value as JsonValue;
use std::io::Write;

/// Traversal guard for images loaded from untrusted bytes; built trees
/// are bounded by the parser's own depth limit.
const MAX_EXPORT_DEPTH: usize = 256;

/// Key used when an item stores only a hash.
fn placeholder_name(item: &ItemRef<'_>) -> String {
    format!("0x{:08x}", item.hash())
}

fn item_name(item: &ItemRef<'_>) -> String {
    match item.name_decoded() {
        Some(name) => name,
        None if item.hash() != 0 => placeholder_name(item),
        None => String::new(),
    }
}

/// Write the whole tree to `out`. Returns false (leaving the writer's
/// error latched) if any writer call failed.
pub fn write_tree<W: Write>(tree: &Tree, out: &mut JsonWriter<W>) -> bool {
    let root = tree.root();
    let opened = if root.item_type() == ItemType::Array {
        out.push_array("")
    } else {
        out.push_object("")
    };
    if !opened {
        return false;
    }

    // iterative depth-first walk; the stack holds the sibling to resume
    // at after each container closes
    let mut stack: Vec<Option<ItemRef<'_>>> = Vec::new();
    let mut cursor = root.first_child();
    loop {
        let Some(item) = cursor else {
            match stack.pop() {
                Some(resume) => {
                    if !out.close() {
                        return false;
                    }
                    cursor = resume;
                    continue;
                }
                None => break,
            }
        };

        let name = item_name(&item);
        let mut descend = None;
        match item.item_type() {
            ItemType::Root | ItemType::Object => {
                out.push_object(&name);
                descend = item.first_child();
                if descend.is_none() {
                    out.close();
                }
            }
            ItemType::Array => {
                out.push_array(&name);
                descend = item.first_child();
                if descend.is_none() {
                    out.close();
                }
            }
            ItemType::String => {
                out.push_str(&name, &item.str_decoded().unwrap_or_default());
            }
            ItemType::Int => {
                out.push_int(&name, item.as_int().unwrap_or(0) as i64);
            }
            ItemType::Float => {
                let value = item.as_float().unwrap_or(0.0 as crate::Float);
                #[cfg(not(feature = "narrow-values"))]
                out.push_float(&name, value);
                #[cfg(feature = "narrow-values")]
                out.push_float32(&name, value);
            }
            ItemType::Bool => {
                out.push_bool(&name, item.as_bool().unwrap_or(false));
            }
            ItemType::NullTag => {
                out.push_null_anon();
            }
            ItemType::NullValue => {
                out.push_null(&name);
            }
        }
        if out.last_error().is_some() {
            return false;
        }

        cursor = item.next_sibling();
        if let Some(child) = descend {
            if stack.len() >= MAX_EXPORT_DEPTH {
                return false;
            }
            stack.push(cursor);
            cursor = Some(child);
        }
    }
    out.close()
}

/// Regenerate the tree as a JSON string.
///
/// # Errors
///
/// Returns the writer's latched error; with a `Vec` sink that only
/// happens on malformed reloaded images.
pub fn to_json_string(tree: &Tree) -> Result<String, WriteError> {
    let mut out = JsonWriter::new(Vec::new());
    if !write_tree(tree, &mut out) || !out.finish() {
        return Err(out.take_error().unwrap_or(WriteError::NoContainer));
    }
    let bytes = out.into_inner();
    Ok(String::from_utf8(bytes).expect("writer emits UTF-8"))
}

/// Convert a tree to a `serde_json::Value`.
///
/// Duplicate keys collapse (last occurrence wins) and hash-only keys
/// appear as `0x`-prefixed placeholders, so this is a lossy view next
/// to [`write_tree`].
#[must_use]
pub fn to_serde_value(tree: &Tree) -> JsonValue {
    convert(tree.root(), 0)
}

fn convert(item: ItemRef<'_>, depth: usize) -> JsonValue {
    if depth > MAX_EXPORT_DEPTH {
        return JsonValue::Null;
    }
    match item.item_type() {
        ItemType::Root | ItemType::Object => {
            let mut map = serde_json::Map::with_capacity(item.child_count() as usize);
            for child in item.children() {
                map.insert(item_name(&child), convert(child, depth + 1));
            }
            JsonValue::Object(map)
        }
        ItemType::Array => JsonValue::Array(
            item.children()
                .map(|child| convert(child, depth + 1))
                .collect(),
        ),
        ItemType::String => JsonValue::String(item.str_decoded().unwrap_or_default()),
        ItemType::Int => JsonValue::Number((item.as_int().unwrap_or(0) as i64).into()),
        ItemType::Float => {
            let value = f64::from(item.as_float().unwrap_or(0.0 as crate::Float));
            match serde_json::Number::from_f64(value) {
                Some(n) => JsonValue::Number(n),
                None => JsonValue::Null,
            }
        }
        ItemType::Bool => JsonValue::Bool(item.as_bool().unwrap_or(false)),
        ItemType::NullTag | ItemType::NullValue => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;

    #[test]
    fn test_write_tree_shape() {
        let tree = build(br#"{"name": "demo", "list": [1, 2.5, null], "ok": true}"#).unwrap();
        let text = to_json_string(&tree).unwrap();
        assert_eq!(
            text,
            concat!(
                "{\n",
                "  \"name\" : \"demo\",\n",
                "  \"list\" : [ 1, 2.5, null ],\n",
                "  \"ok\" : true\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_write_tree_root_array() {
        let tree = build(b"[1, [2, 3], {}]").unwrap();
        let text = to_json_string(&tree).unwrap();
        let reparsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, serde_json::json!([1, [2, 3], {}]));
    }

    #[test]
    fn test_to_serde_value() {
        let tree = build(br#"{"a": {"b": [true, "x"]}, "n": null}"#).unwrap();
        assert_eq!(
            to_serde_value(&tree),
            serde_json::json!({"a": {"b": [true, "x"]}, "n": null})
        );
    }

    #[test]
    fn test_null_tag_in_object_round_trip() {
        // a bare null member is regenerated bare, as it was parsed
        let tree = build(b"{null}").unwrap();
        let text = to_json_string(&tree).unwrap();
        assert_eq!(text, "{\n  null\n}\n");
    }
}
