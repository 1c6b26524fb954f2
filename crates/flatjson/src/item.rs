//! Zero-copy item views over a tree image.
//!
//! An [`ItemRef`] is a borrowed `(image, index)` pair that reads fields
//! on demand; nothing is parsed up front and nothing allocates. Use
//! [`ItemRef::value`] for pattern matching:
//!
//! ```
//! use flatjson::{build, ItemValue};
//!
//! let tree = build(br#"{"n": 42}"#).unwrap();
//! let n = tree.root().find("n").unwrap();
//! match n.value() {
//!     ItemValue::Int(v) => assert_eq!(v, 42),
//!     other => panic!("expected an int, got {other:?}"),
//! }
//! ```

use crate::fnv::fnv1a;
use crate::tree::{
    FLAG_UTF16, ITEM_HASH, ITEM_NAME_LEN, ITEM_NAME_OFF, ITEM_PACKED, ITEM_VALUE, get_u32,
    get_u64, item_offset,
};
use crate::{Float, Int};

/// Type tag of one item in the flat array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemType {
    /// The synthetic item 0 of an object-rooted document.
    Root = 0,
    Object = 1,
    Array = 2,
    String = 3,
    Int = 4,
    Float = 5,
    Bool = 6,
    /// A `null` in a place that allows an unnamed placeholder.
    NullTag = 7,
    /// A named field whose value is `null`.
    NullValue = 8,
}

impl ItemType {
    #[must_use]
    pub(crate) fn from_u8(b: u8) -> Option<ItemType> {
        Some(match b {
            0 => ItemType::Root,
            1 => ItemType::Object,
            2 => ItemType::Array,
            3 => ItemType::String,
            4 => ItemType::Int,
            5 => ItemType::Float,
            6 => ItemType::Bool,
            7 => ItemType::NullTag,
            8 => ItemType::NullValue,
            _ => return None,
        })
    }

    /// True for `Root`, `Object` and `Array`.
    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, ItemType::Root | ItemType::Object | ItemType::Array)
    }
}

/// A typed view of an item's value for pattern matching.
///
/// `Root` items appear as `Object`; both null kinds appear as `Null`.
/// String values in a UTF-16 encoded tree appear as `RawStr` with the
/// raw code unit bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemValue<'a> {
    Null,
    Bool(bool),
    Int(Int),
    Float(Float),
    Str(&'a str),
    RawStr(&'a [u8]),
    /// Object (or root) with its child count.
    Object(u32),
    /// Array with its child count.
    Array(u32),
}

/// A read-only view of one item at a flat array index.
///
/// Holds the whole image slice plus the index; 16 bytes on 64-bit
/// targets. Copy freely.
#[derive(Clone, Copy)]
pub struct ItemRef<'a> {
    data: &'a [u8],
    index: u32,
}

impl<'a> ItemRef<'a> {
    pub(crate) fn new(data: &'a [u8], index: u32) -> Self {
        ItemRef { data, index }
    }

    /// Flat array index of this item.
    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    fn offset(&self) -> usize {
        item_offset(self.index)
    }

    #[inline]
    fn packed(&self) -> u32 {
        get_u32(self.data, self.offset() + ITEM_PACKED)
    }

    #[inline]
    fn image_item_count(&self) -> u32 {
        get_u32(self.data, 4)
    }

    #[inline]
    fn utf16(&self) -> bool {
        get_u32(self.data, 12) & FLAG_UTF16 != 0
    }

    /// Type tag.
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        // the tag byte is validated at build/reload time
        ItemType::from_u8((self.packed() & 0xFF) as u8).unwrap_or(ItemType::NullTag)
    }

    /// Positive index delta to the next sibling; 0 when this is the last
    /// child.
    #[inline]
    fn sibling_step(&self) -> u32 {
        self.packed() >> 8
    }

    /// 32-bit FNV-1a of the UTF-8 key, or 0 for unnamed items.
    #[must_use]
    pub fn hash(&self) -> u32 {
        get_u32(self.data, self.offset() + ITEM_HASH)
    }

    /// Encoded bytes of the key, resolved through the self-relative blob
    /// reference. `None` when no name is stored.
    #[must_use]
    pub fn name_bytes(&self) -> Option<&'a [u8]> {
        self.resolve_str(self.offset() + ITEM_NAME_OFF, self.name_len())
    }

    /// The key as `&str`. `None` for unnamed items, trees built without
    /// key names, or UTF-16 encoded trees (use
    /// [`name_decoded`](ItemRef::name_decoded) there).
    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        if self.utf16() {
            return None;
        }
        std::str::from_utf8(self.name_bytes()?).ok()
    }

    /// The key decoded to an owned string, in either blob encoding.
    #[must_use]
    pub fn name_decoded(&self) -> Option<String> {
        decode_blob_str(self.name_bytes()?, self.utf16())
    }

    /// Encoded byte length of the key (0 when absent).
    #[must_use]
    pub fn name_len(&self) -> u32 {
        get_u32(self.data, self.offset() + ITEM_NAME_LEN)
    }

    /// Integer value, coercing floats. `None` for non-numeric items.
    #[must_use]
    pub fn as_int(&self) -> Option<Int> {
        match self.item_type() {
            ItemType::Int => Some(self.raw_int()),
            ItemType::Float => Some(self.raw_float() as Int),
            _ => None,
        }
    }

    /// Float value, coercing integers. `None` for non-numeric items.
    #[must_use]
    pub fn as_float(&self) -> Option<Float> {
        match self.item_type() {
            ItemType::Float => Some(self.raw_float()),
            ItemType::Int => Some(self.raw_int() as Float),
            _ => None,
        }
    }

    /// Boolean value. `None` for non-boolean items.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.item_type() {
            ItemType::Bool => Some(self.data[self.offset() + ITEM_VALUE] != 0),
            _ => None,
        }
    }

    /// String value as `&str` (UTF-8 trees only).
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        if self.utf16() {
            return None;
        }
        std::str::from_utf8(self.str_bytes()?).ok()
    }

    /// Encoded bytes of a string value.
    #[must_use]
    pub fn str_bytes(&self) -> Option<&'a [u8]> {
        if self.item_type() != ItemType::String {
            return None;
        }
        self.resolve_str(self.offset() + ITEM_VALUE, self.str_len())
    }

    /// String value decoded to an owned string, in either blob encoding.
    #[must_use]
    pub fn str_decoded(&self) -> Option<String> {
        decode_blob_str(self.str_bytes()?, self.utf16())
    }

    /// Encoded byte length of a string value (0 otherwise).
    #[must_use]
    pub fn str_len(&self) -> u32 {
        match self.item_type() {
            ItemType::String => get_u32(self.data, self.offset() + ITEM_VALUE + 4),
            _ => 0,
        }
    }

    /// Number of direct children (0 for non-containers).
    #[must_use]
    pub fn child_count(&self) -> u32 {
        if self.item_type().is_container() {
            get_u32(self.data, self.offset() + ITEM_VALUE)
        } else {
            0
        }
    }

    /// Typed value for pattern matching.
    #[must_use]
    pub fn value(&self) -> ItemValue<'a> {
        match self.item_type() {
            ItemType::Root | ItemType::Object => ItemValue::Object(self.child_count()),
            ItemType::Array => ItemValue::Array(self.child_count()),
            ItemType::String => {
                let bytes = self.str_bytes().unwrap_or(b"");
                if self.utf16() {
                    ItemValue::RawStr(bytes)
                } else {
                    match std::str::from_utf8(bytes) {
                        Ok(s) => ItemValue::Str(s),
                        Err(_) => ItemValue::RawStr(bytes),
                    }
                }
            }
            ItemType::Int => ItemValue::Int(self.raw_int()),
            ItemType::Float => ItemValue::Float(self.raw_float()),
            ItemType::Bool => ItemValue::Bool(self.data[self.offset() + ITEM_VALUE] != 0),
            ItemType::NullTag | ItemType::NullValue => ItemValue::Null,
        }
    }

    /// First child. Valid when this is a container with children; the
    /// first child always sits at the next flat index.
    #[must_use]
    pub fn first_child(&self) -> Option<ItemRef<'a>> {
        if self.item_type().is_container() && self.child_count() > 0 {
            let index = self.index + 1;
            (index < self.image_item_count()).then(|| ItemRef::new(self.data, index))
        } else {
            None
        }
    }

    /// Next item at this hierarchy level, or `None` after the last.
    #[must_use]
    pub fn next_sibling(&self) -> Option<ItemRef<'a>> {
        let step = self.sibling_step();
        if step == 0 {
            return None;
        }
        let index = self.index + step;
        (index < self.image_item_count()).then(|| ItemRef::new(self.data, index))
    }

    /// Forward iterator over direct children. Call `children()` on a
    /// yielded item to descend.
    #[must_use]
    pub fn children(&self) -> Children<'a> {
        Children {
            next: self.first_child(),
        }
    }

    /// First child whose name hash matches. Linear in the child count;
    /// only named containers (`Root`/`Object`) can match. Hash collisions
    /// are possible on hostile input: prefer [`find`](ItemRef::find)
    /// when key names are stored.
    #[must_use]
    pub fn find_by_hash(&self, hash: u32) -> Option<ItemRef<'a>> {
        match self.item_type() {
            ItemType::Root | ItemType::Object => {
                self.children().find(|child| child.hash() == hash)
            }
            _ => None,
        }
    }

    /// First child with this key. Compares the stored name when present,
    /// so hash collisions cannot produce a false match.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ItemRef<'a>> {
        let hash = fnv1a(name.as_bytes());
        match self.item_type() {
            ItemType::Root | ItemType::Object => self.children().find(|child| {
                child.hash() == hash
                    && match child.name_decoded() {
                        Some(stored) => stored == name,
                        None => true,
                    }
            }),
            _ => None,
        }
    }

    #[inline]
    fn raw_int(&self) -> Int {
        get_u64(self.data, self.offset() + ITEM_VALUE) as i64 as Int
    }

    #[inline]
    fn raw_float(&self) -> Float {
        f64::from_bits(get_u64(self.data, self.offset() + ITEM_VALUE)) as Float
    }

    /// Resolve a self-relative string reference at `field` into the blob.
    fn resolve_str(&self, field: usize, len: u32) -> Option<&'a [u8]> {
        let rel = get_u32(self.data, field);
        if rel == 0 {
            return None;
        }
        let start = field + rel as usize;
        self.data.get(start..start + len as usize)
    }
}

impl std::fmt::Debug for ItemRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemRef")
            .field("index", &self.index)
            .field("type", &self.item_type())
            .field("value", &self.value())
            .finish()
    }
}

/// Forward iterator over a container's direct children.
#[derive(Clone)]
pub struct Children<'a> {
    next: Option<ItemRef<'a>>,
}

impl<'a> Iterator for Children<'a> {
    type Item = ItemRef<'a>;

    fn next(&mut self) -> Option<ItemRef<'a>> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}

fn decode_blob_str(bytes: &[u8], utf16: bool) -> Option<String> {
    if utf16 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;

    #[test]
    fn test_scalar_accessors() {
        let tree = build(br#"{"i": 7, "f": 2.5, "b": true, "s": "hi", "n": null}"#).unwrap();
        let root = tree.root();

        let i = root.find("i").unwrap();
        assert_eq!(i.item_type(), ItemType::Int);
        assert_eq!(i.as_int(), Some(7));
        assert_eq!(i.as_float(), Some(7.0 as Float));
        assert_eq!(i.as_bool(), None);
        assert_eq!(i.as_str(), None);

        let f = root.find("f").unwrap();
        assert_eq!(f.item_type(), ItemType::Float);
        assert_eq!(f.as_int(), Some(2));
        assert!((f.as_float().unwrap() - 2.5 as Float).abs() < 1e-6 as Float);

        let b = root.find("b").unwrap();
        assert_eq!(b.as_bool(), Some(true));

        let s = root.find("s").unwrap();
        assert_eq!(s.as_str(), Some("hi"));
        assert_eq!(s.str_len(), 2);

        let n = root.find("n").unwrap();
        assert_eq!(n.item_type(), ItemType::NullValue);
        assert_eq!(n.value(), ItemValue::Null);
    }

    #[test]
    fn test_names_and_hashes() {
        let tree = build(br#"{"alpha": 1}"#).unwrap();
        let item = tree.root().first_child().unwrap();
        assert_eq!(item.name(), Some("alpha"));
        assert_eq!(item.name_len(), 5);
        assert_eq!(item.hash(), fnv1a(b"alpha"));
        assert_eq!(tree.root().find_by_hash(fnv1a(b"alpha")).unwrap().index(), item.index());
        assert!(tree.root().find_by_hash(fnv1a(b"beta")).is_none());
    }

    #[test]
    fn test_children_iteration() {
        let tree = build(br#"{"a": 1, "b": [true, null], "c": 3}"#).unwrap();
        let names: Vec<_> = tree
            .root()
            .children()
            .map(|c| c.name().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);

        let b = tree.root().find("b").unwrap();
        let kinds: Vec<_> = b.children().map(|c| c.item_type()).collect();
        assert_eq!(kinds, [ItemType::Bool, ItemType::NullTag]);
        // array children are unnamed
        assert!(b.children().all(|c| c.name().is_none() && c.hash() == 0));
    }

    #[test]
    fn test_first_child_rules() {
        let tree = build(br#"{"empty": {}, "one": [5]}"#).unwrap();
        let empty = tree.root().find("empty").unwrap();
        assert_eq!(empty.child_count(), 0);
        assert!(empty.first_child().is_none());

        let one = tree.root().find("one").unwrap();
        assert_eq!(one.child_count(), 1);
        let child = one.first_child().unwrap();
        assert_eq!(child.index(), one.index() + 1);
        assert!(child.next_sibling().is_none());
    }

    #[test]
    fn test_find_on_non_object_is_none() {
        let tree = build(br#"{"arr": [1, 2]}"#).unwrap();
        let arr = tree.root().find("arr").unwrap();
        assert!(arr.find("x").is_none());
        assert!(arr.find_by_hash(0).is_none());
    }
}
