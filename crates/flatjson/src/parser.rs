//! The parser state machine and the two-pass tree builder.
//!
//! Parsing runs the same pushdown recogniser twice. The first pass
//! counts items and interns the unique strings; with the exact image
//! size then known, one zeroed allocation is made, the blob is encoded,
//! and the second pass fills the item records. The only retained
//! allocation is the image itself.
//!
//! Two stacks drive the recogniser: the *context stack* of parse states
//! and the *hierarchy stack* of per-depth `(parent, elder sibling)`
//! cursors that the fill pass patches sibling links through.

use crate::error::{Error, ErrorKind, Result};
use crate::fnv;
use crate::intern::{InternTable, StrOffset};
use crate::item::ItemType;
use crate::number;
use crate::options::{BuildOptions, StringEncoding};
use crate::text::{self, Scanner};
use crate::tree::{
    self, BuildStats, FLAG_UTF16, HEADER_SIZE, ITEM_HASH, ITEM_NAME_LEN, ITEM_NAME_OFF,
    ITEM_PACKED, ITEM_SIZE, ITEM_VALUE, MAGIC, Tree,
};
use std::ops::Range;

/// Parse contexts. `Value` expects exactly one value; the container
/// contexts sit on the stack for as long as the container is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Root,
    GetTag,
    Colon,
    Value,
    ObjectOpen,
    Object,
    ObjectClose,
    ArrayOpen,
    Array,
    ArrayClose,
    NullTag,
    StringValue,
    NumericValue,
    TrueValue,
    FalseValue,
    NullValue,
}

/// Per-depth cursor: the parent's index and the previous child at this
/// depth, whose sibling step gets patched when the next child arrives.
struct HierSlot {
    parent: u32,
    elder: Option<u32>,
}

type PResult<T> = std::result::Result<T, (ErrorKind, usize)>;

/// Build a tree from raw JSON bytes.
pub(crate) fn build_tree(input: &[u8], opts: &BuildOptions) -> Result<Tree> {
    let mut bom = 0usize;
    let mut src = input;
    if opts.utf8_bom && src.starts_with(&text::BOM) {
        src = &src[text::BOM.len()..];
        bom = text::BOM.len();
    }

    let mut builder = Builder::new(src, opts);
    match builder.run() {
        Ok(mut stats) => {
            stats.bytes_read += bom as u32;
            Ok(Tree::from_image(std::mem::take(&mut builder.image), stats))
        }
        Err((kind, pos)) => Err(locate(src, kind, pos, bom)),
    }
}

/// Recover line/column for an error position by scanning the consumed
/// prefix. Tabs count as one column.
fn locate(src: &[u8], kind: ErrorKind, pos: usize, bom: usize) -> Error {
    if kind.locationless() {
        return Error::locationless(kind);
    }
    let mut line = 1u32;
    let mut line_start = 0usize;
    for (i, &b) in src[..pos.min(src.len())].iter().enumerate() {
        if b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    Error::new(kind, line, (pos - line_start + 1) as u32, (pos + bom) as u32)
}

/// Count quoted string occurrences, skipping comments when enabled.
/// Sizes the intern table and bounds its capacity.
fn count_quotes(src: &[u8], comments: bool) -> u32 {
    let mut s = Scanner::new(src);
    let mut n = 0u32;
    while let Some(b) = s.peek() {
        match b {
            b'/' if comments => {
                if !s.skip_comment() {
                    s.bump();
                }
            }
            b'"' => {
                if s.scan_quoted().is_err() {
                    break;
                }
                n += 1;
            }
            _ => s.bump(),
        }
    }
    n
}

struct Builder<'a> {
    src: &'a [u8],
    opts: &'a BuildOptions,
    intern: InternTable,
    offsets: Vec<StrOffset>,
    image: Vec<u8>,
    /// False during the counting pass, true during the fill pass.
    filling: bool,
    /// Items seen this pass (the root is pre-counted).
    items: u32,
    /// Index of the next unwritten item in the fill pass.
    next_item: u32,
    blob_base: usize,
    ctx: Vec<Ctx>,
    hier: Vec<HierSlot>,
}

impl<'a> Builder<'a> {
    fn new(src: &'a [u8], opts: &'a BuildOptions) -> Self {
        Builder {
            src,
            opts,
            intern: InternTable::new(0),
            offsets: Vec::new(),
            image: Vec::new(),
            filling: false,
            items: 0,
            next_item: 0,
            blob_base: 0,
            ctx: Vec::new(),
            hier: Vec::new(),
        }
    }

    fn run(&mut self) -> PResult<BuildStats> {
        let occurrences = count_quotes(self.src, self.opts.comments);
        self.intern = InternTable::new(occurrences as usize);

        // pass 1: count items, intern strings
        self.filling = false;
        self.parse_pass()?;
        let total_items = self.items;

        // size and allocate the single image
        let blob_bytes =
            self.intern
                .encoded_size(self.src, self.opts.encoding, self.opts.surrogate_pairs);
        let total = HEADER_SIZE + total_items as usize * ITEM_SIZE + blob_bytes;
        self.blob_base = total - blob_bytes;

        let mut image = Vec::new();
        if image.try_reserve_exact(total).is_err() {
            return Err((ErrorKind::OutOfMemory, 0));
        }
        image.extend_from_slice(MAGIC);
        image.extend_from_slice(&total_items.to_ne_bytes());
        image.extend_from_slice(&(blob_bytes as u32).to_ne_bytes());
        let flags = match self.opts.encoding {
            StringEncoding::Utf8 => 0u32,
            StringEncoding::Utf16 => FLAG_UTF16,
        };
        image.extend_from_slice(&flags.to_ne_bytes());
        image.resize(self.blob_base, 0);
        self.offsets = self.intern.finalize(
            self.src,
            self.opts.encoding,
            self.opts.surrogate_pairs,
            &mut image,
        );
        debug_assert_eq!(image.len(), total);
        self.image = image;

        // pass 2: fill the item records
        self.filling = true;
        let bytes_read = self.parse_pass()?;

        Ok(BuildStats {
            bytes_read: bytes_read as u32,
            item_count: total_items,
            total_bytes: total as u32,
            text_bytes: blob_bytes as u32,
            unique_strings: self.intern.len() as u32,
            string_occurrences: occurrences,
        })
    }

    /// One full run of the recogniser. Returns how many bytes were
    /// consumed.
    fn parse_pass(&mut self) -> PResult<usize> {
        self.ctx.clear();
        self.ctx.push(Ctx::Root);
        self.hier.clear();
        self.hier.push(HierSlot {
            parent: 0,
            elder: None,
        });
        self.items = 1; // the synthetic root
        self.next_item = 1;
        if self.filling {
            // item 0 is zeroed; Root is tag 0, retyped on a root array
            self.set_type(0, ItemType::Root);
        }

        let mut s = Scanner::new(self.src);
        loop {
            s.skip_blank(self.opts.comments);
            let Some(c) = s.peek() else { break };
            let at = s.pos();
            let ctx = *self.ctx.last().expect("context stack never empties");

            // token dispatch
            match c {
                b'{' => {
                    s.bump();
                    if ctx == Ctx::Root {
                        self.push_ctx(Ctx::Object, at)?;
                    } else if ctx == Ctx::Value || ctx == Ctx::Array {
                        self.push_ctx(Ctx::ObjectOpen, at)?;
                    } else {
                        return Err((ErrorKind::UnexpectedBrace, at));
                    }
                }
                b'}' => {
                    s.bump();
                    if ctx == Ctx::Object {
                        self.set_ctx(Ctx::ObjectClose);
                    } else {
                        return Err((ErrorKind::UnexpectedCloseBrace, at));
                    }
                }
                b'[' => {
                    s.bump();
                    if ctx == Ctx::Root && self.opts.root_array {
                        self.push_ctx(Ctx::Array, at)?;
                        if self.filling {
                            self.set_type(0, ItemType::Array);
                        }
                    } else if ctx == Ctx::Value || ctx == Ctx::Array {
                        self.push_ctx(Ctx::ArrayOpen, at)?;
                    } else {
                        return Err((ErrorKind::UnexpectedBracket, at));
                    }
                }
                b']' => {
                    s.bump();
                    if ctx == Ctx::Array {
                        self.set_ctx(Ctx::ArrayClose);
                    } else {
                        return Err((ErrorKind::UnexpectedCloseBracket, at));
                    }
                }
                b'"' => match ctx {
                    Ctx::Object => self.push_ctx(Ctx::GetTag, at)?,
                    Ctx::Array => self.push_ctx(Ctx::StringValue, at)?,
                    Ctx::Value => self.set_ctx(Ctx::StringValue),
                    _ => return Err((ErrorKind::UnexpectedQuote, at)),
                },
                b':' => {
                    s.bump();
                    if ctx == Ctx::Colon {
                        self.set_ctx(Ctx::Value);
                    } else {
                        return Err((ErrorKind::UnexpectedColon, at));
                    }
                }
                b',' => {
                    s.bump();
                    if ctx != Ctx::Object && ctx != Ctx::Array {
                        return Err((ErrorKind::UnexpectedComma, at));
                    }
                }
                b'0'..=b'9' | b'.' | b'-' | b'+' => {
                    if ctx == Ctx::Value || ctx == Ctx::Array {
                        self.enter_value(Ctx::NumericValue, ctx, at)?;
                    } else {
                        return Err((ErrorKind::UnexpectedCharacter, at));
                    }
                }
                // comments were consumed as whitespace; a surviving slash
                // is always stray
                b'/' => return Err((ErrorKind::UnexpectedCharacter, at)),
                _ => {
                    let rest = &self.src[at..];
                    if (ctx == Ctx::Object || ctx == Ctx::Array) && keyword(rest, b"null") {
                        self.push_ctx(Ctx::NullTag, at)?;
                        s.advance(4);
                    } else if ctx != Ctx::Value && ctx != Ctx::Array {
                        return Err((ErrorKind::UnexpectedKeyword, at));
                    } else if keyword(rest, b"true") {
                        self.enter_value(Ctx::TrueValue, ctx, at)?;
                        s.advance(4);
                    } else if keyword(rest, b"false") {
                        self.enter_value(Ctx::FalseValue, ctx, at)?;
                        s.advance(5);
                    } else if keyword(rest, b"null") {
                        self.enter_value(Ctx::NullValue, ctx, at)?;
                        s.advance(4);
                    } else {
                        return Err((ErrorKind::UnexpectedCharacter, at));
                    }
                }
            }

            // handle the context the token produced
            match *self.ctx.last().expect("context stack never empties") {
                Ctx::GetTag => {
                    let range = s.scan_quoted().map_err(|k| (k, at))?;
                    self.take_key(range, at)?;
                    self.set_ctx(Ctx::Colon);
                }
                Ctx::StringValue => {
                    let range = s.scan_quoted().map_err(|k| (k, at))?;
                    self.take_string_value(range, at)?;
                    self.step_value(ItemType::String, at)?;
                }
                Ctx::NumericValue => {
                    let scan = number::scan_number(&self.src[s.pos()..]);
                    if !scan.representable {
                        return Err((ErrorKind::Unrepresentable, at));
                    }
                    if self.filling {
                        let off = tree::item_offset(self.next_item) + ITEM_VALUE;
                        if scan.is_real {
                            tree::put_u64(&mut self.image, off, (scan.float as f64).to_bits());
                        } else {
                            tree::put_u64(&mut self.image, off, (scan.int as i64) as u64);
                        }
                    }
                    s.advance(scan.len);
                    let ty = if scan.is_real {
                        ItemType::Float
                    } else {
                        ItemType::Int
                    };
                    self.step_value(ty, at)?;
                }
                Ctx::TrueValue => {
                    self.put_bool(true);
                    self.step_value(ItemType::Bool, at)?;
                }
                Ctx::FalseValue => {
                    self.put_bool(false);
                    self.step_value(ItemType::Bool, at)?;
                }
                Ctx::NullTag => self.step_value(ItemType::NullTag, at)?,
                Ctx::NullValue => self.step_value(ItemType::NullValue, at)?,
                Ctx::ObjectOpen => {
                    self.step_value(ItemType::Object, at)?;
                    self.open_container(Ctx::Object, at)?;
                }
                Ctx::ArrayOpen => {
                    self.step_value(ItemType::Array, at)?;
                    self.open_container(Ctx::Array, at)?;
                }
                Ctx::ObjectClose | Ctx::ArrayClose => {
                    self.ctx.pop();
                    if self.filling {
                        self.hier.pop();
                    }
                }
                _ => {}
            }

            if self.ctx.len() == 1 {
                // back at the root context: the document is complete
                break;
            }
        }

        if self.ctx.len() > 1 {
            return Err((ErrorKind::UnexpectedEof, s.pos()));
        }
        Ok(s.pos())
    }

    /// Single array-value-entry transition: a value state is pushed over
    /// an array context and replaces a `Value` context.
    fn enter_value(&mut self, state: Ctx, ctx: Ctx, at: usize) -> PResult<()> {
        if ctx == Ctx::Array {
            self.push_ctx(state, at)
        } else {
            self.set_ctx(state);
            Ok(())
        }
    }

    /// After `step_value` popped an open state: the container context is
    /// pushed over an array and otherwise replaces the `Value` context.
    fn open_container(&mut self, state: Ctx, at: usize) -> PResult<()> {
        let under = *self.ctx.last().expect("context stack never empties");
        self.enter_value(state, under, at)
    }

    fn push_ctx(&mut self, ctx: Ctx, at: usize) -> PResult<()> {
        if self.ctx.len() >= self.opts.max_context {
            return Err((ErrorKind::DepthExceeded, at));
        }
        self.ctx.push(ctx);
        Ok(())
    }

    fn set_ctx(&mut self, ctx: Ctx) {
        *self.ctx.last_mut().expect("context stack never empties") = ctx;
    }

    /// Key read in an object: hash it and resolve or intern the name.
    fn take_key(&mut self, range: Range<usize>, at: usize) -> PResult<()> {
        if self.filling {
            let off = tree::item_offset(self.next_item);
            if !range.is_empty() {
                let hash = fnv::hash_key(&self.src[range.clone()], self.opts.surrogate_pairs);
                tree::put_u32(&mut self.image, off + ITEM_HASH, hash);
                if self.opts.store_key_names {
                    let entry = self.resolve(range, at)?;
                    let field = off + ITEM_NAME_OFF;
                    let target = self.blob_base + entry.offset as usize;
                    tree::put_u32(&mut self.image, field, (target - field) as u32);
                    tree::put_u32(&mut self.image, off + ITEM_NAME_LEN, entry.len);
                }
            }
        } else if !range.is_empty() && self.opts.store_key_names {
            self.intern
                .count(self.src, range)
                .map_err(|k| (k, at))?;
        }
        Ok(())
    }

    /// String value: resolve or intern, then write the self-relative
    /// reference.
    fn take_string_value(&mut self, range: Range<usize>, at: usize) -> PResult<()> {
        if self.filling {
            if !range.is_empty() {
                let entry = self.resolve(range, at)?;
                let field = tree::item_offset(self.next_item) + ITEM_VALUE;
                let target = self.blob_base + entry.offset as usize;
                tree::put_u32(&mut self.image, field, (target - field) as u32);
                tree::put_u32(&mut self.image, field + 4, entry.len);
            }
        } else if !range.is_empty() {
            self.intern
                .count(self.src, range)
                .map_err(|k| (k, at))?;
        }
        Ok(())
    }

    fn resolve(&self, range: Range<usize>, at: usize) -> PResult<StrOffset> {
        match self.intern.lookup(self.src, range) {
            Some(index) => Ok(self.offsets[index]),
            None => Err((ErrorKind::StringTableMiss, at)),
        }
    }

    fn put_bool(&mut self, v: bool) {
        if self.filling {
            let off = tree::item_offset(self.next_item) + ITEM_VALUE;
            self.image[off] = u8::from(v);
        }
    }

    fn set_type(&mut self, index: u32, ty: ItemType) {
        let off = tree::item_offset(index) + ITEM_PACKED;
        let packed = (tree::get_u32(&self.image, off) & !0xFF) | ty as u32;
        tree::put_u32(&mut self.image, off, packed);
    }

    /// Finalise the current item and pop its value state. In the fill
    /// pass this links the item into the hierarchy and, for containers,
    /// descends one level.
    fn step_value(&mut self, ty: ItemType, at: usize) -> PResult<()> {
        self.items += 1;
        self.ctx.pop();
        if !self.filling {
            return Ok(());
        }
        let current = self.next_item;
        let slot = self.hier.last_mut().expect("hierarchy stack never empties");

        // one more child under the current parent
        let count_off = tree::item_offset(slot.parent) + ITEM_VALUE;
        let count = tree::get_u32(&self.image, count_off);
        tree::put_u32(&mut self.image, count_off, count + 1);

        // patch the elder sibling's step to point here
        if let Some(elder) = slot.elder {
            let step = current - elder;
            if step > 0x00FF_FFFF {
                return Err((ErrorKind::SiblingSpanExceeded, at));
            }
            let off = tree::item_offset(elder) + ITEM_PACKED;
            let packed = (tree::get_u32(&self.image, off) & 0xFF) | (step << 8);
            tree::put_u32(&mut self.image, off, packed);
        }
        slot.elder = Some(current);

        self.set_type(current, ty);
        if matches!(ty, ItemType::Object | ItemType::Array) {
            if self.hier.len() >= self.opts.max_depth {
                return Err((ErrorKind::DepthExceeded, at));
            }
            self.hier.push(HierSlot {
                parent: current,
                elder: None,
            });
        }
        self.next_item += 1;
        Ok(())
    }
}

/// ASCII case-insensitive keyword prefix match.
fn keyword(rest: &[u8], kw: &[u8]) -> bool {
    rest.len() >= kw.len() && rest[..kw.len()].eq_ignore_ascii_case(kw)
}
