//! Streaming JSON text writer.
//!
//! [`JsonWriter`] keeps a fixed 4 KiB buffer in front of an
//! [`io::Write`] sink and tracks the open hierarchy with two
//! depth-indexed bitsets. Errors latch: after the first failure every
//! call is a no-op returning `false`, and [`last_error`] reports the
//! cause, so callers may check only occasionally or once at the end.
//!
//! Nothing is emitted at construction. The first `push_object` or
//! `push_array` opens the root; the matching `close` appends the final
//! newline.
//!
//! ```
//! use flatjson::JsonWriter;
//!
//! let mut w = JsonWriter::new(Vec::new());
//! w.push_object("");
//! w.push_float("n", 3.14);
//! w.close();
//! assert!(w.finish());
//! assert_eq!(w.into_inner(), b"{\n  \"n\" : 3.14\n}\n");
//! ```
//!
//! [`last_error`]: JsonWriter::last_error

use crate::error::WriteError;
use crate::number;
use std::io::{self, Write};

const BUFFER_SIZE: usize = 4096;
const MAX_DEPTH: usize = 256;
/// Approximate column where long arrays wrap onto a new line.
const MAX_ARRAY_COLUMN: usize = 200;
const MAX_INDENT: usize = 32;
const DOUBLE_PRECISION: i32 = 17;
const SINGLE_PRECISION: i32 = 10;

/// Fixed bitset indexed by hierarchy depth.
struct DepthSet {
    bits: [u64; MAX_DEPTH / 64],
}

impl DepthSet {
    fn new() -> Self {
        DepthSet {
            bits: [0; MAX_DEPTH / 64],
        }
    }

    #[inline]
    fn set(&mut self, i: usize) {
        self.bits[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    fn clear(&mut self, i: usize) {
        self.bits[i / 64] &= !(1 << (i % 64));
    }

    #[inline]
    fn get(&self, i: usize) -> bool {
        self.bits[i / 64] & (1 << (i % 64)) != 0
    }
}

/// What the previous call emitted; drives separator placement.
#[derive(Clone, Copy, PartialEq)]
enum Prev {
    None,
    Scalar,
    Object,
    ObjectEnd,
    Array,
    ArrayEnd,
}

/// Buffered, indentation-aware JSON emitter over a byte sink.
pub struct JsonWriter<W: Write> {
    sink: W,
    buf: Vec<u8>,
    depth: usize,
    indent: [u8; MAX_INDENT],
    indent_len: usize,
    /// Byte offset from the previous newline.
    column: usize,
    has_value: DepthSet,
    is_array: DepthSet,
    prev: Prev,
    err: Option<WriteError>,
}

impl<W: Write> JsonWriter<W> {
    /// Create a writer with the default two-space indent.
    pub fn new(sink: W) -> Self {
        let mut indent = [0u8; MAX_INDENT];
        indent[0] = b' ';
        indent[1] = b' ';
        JsonWriter {
            sink,
            buf: Vec::with_capacity(BUFFER_SIZE),
            depth: 0,
            indent,
            indent_len: 2,
            column: 0,
            has_value: DepthSet::new(),
            is_array: DepthSet::new(),
            prev: Prev::None,
            err: None,
        }
    }

    /// Set the per-level indent string (ASCII, truncated to 32 bytes).
    pub fn set_indent(&mut self, spacing: &str) {
        let bytes = spacing.as_bytes();
        let len = bytes.len().min(MAX_INDENT);
        self.indent[..len].copy_from_slice(&bytes[..len]);
        self.indent_len = len;
    }

    /// Current hierarchy depth (0 = nothing open).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True when the innermost open container is an array.
    #[must_use]
    pub fn in_array(&self) -> bool {
        self.depth > 0 && self.is_array.get(self.depth)
    }

    /// The latched error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&WriteError> {
        self.err.as_ref()
    }

    /// Take the latched error, clearing the latch. Intended for callers
    /// that are done with the writer.
    pub fn take_error(&mut self) -> Option<WriteError> {
        self.err.take()
    }

    /// Consume the writer and return the sink. Unflushed buffered bytes
    /// are dropped; call [`finish`](JsonWriter::finish) first.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.sink
    }

    // --- low-level emission ---

    fn fail(&mut self, err: WriteError) -> bool {
        if self.err.is_none() {
            self.err = Some(err);
        }
        false
    }

    fn flush_buf(&mut self) -> bool {
        if self.buf.is_empty() {
            return true;
        }
        match self.sink.write_all(&self.buf) {
            Ok(()) => {
                self.buf.clear();
                true
            }
            Err(e) => self.fail(WriteError::Io(e)),
        }
    }

    fn put(&mut self, c: u8) -> bool {
        if self.buf.len() >= BUFFER_SIZE && !self.flush_buf() {
            return false;
        }
        self.buf.push(c);
        self.column += 1;
        true
    }

    fn put_raw(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if self.buf.len() >= BUFFER_SIZE && !self.flush_buf() {
                return false;
            }
            self.buf.push(b);
        }
        self.column += bytes.len();
        true
    }

    fn new_line(&mut self) -> bool {
        let ok = self.put(b'\n');
        self.column = 0;
        ok
    }

    fn add_indent(&mut self) -> bool {
        for _ in 0..self.depth {
            let indent = self.indent;
            if !self.put_raw(&indent[..self.indent_len]) {
                return false;
            }
        }
        true
    }

    /// Separator + newline + indent before a keyed value or container.
    fn next_line_indent(&mut self) -> bool {
        if self.has_value.get(self.depth) && !self.put(b',') {
            return false;
        }
        self.new_line() && self.add_indent()
    }

    /// Separator before an array element; stays on the line until it
    /// grows past the wrap column.
    fn next_element(&mut self) -> bool {
        if self.has_value.get(self.depth) && !self.put(b',') {
            return false;
        }
        if self.column < MAX_ARRAY_COLUMN {
            self.put(b' ')
        } else {
            self.new_line() && self.add_indent()
        }
    }

    /// Escaped string contents, without the surrounding quotes.
    fn add_escaped(&mut self, s: &str) -> bool {
        for &b in s.as_bytes() {
            let ok = match b {
                0x08 => self.put_raw(b"\\b"),
                b'\t' => self.put_raw(b"\\t"),
                b'\n' => self.put_raw(b"\\n"),
                0x0C => self.put_raw(b"\\f"),
                b'\r' => self.put_raw(b"\\r"),
                b'"' => self.put_raw(b"\\\""),
                b'\\' => self.put_raw(b"\\\\"),
                c if c < 0x20 => {
                    let hex = b"0123456789abcdef";
                    let esc = [b'\\', b'u', b'0', b'0', hex[(c >> 4) as usize], hex[(c & 0xF) as usize]];
                    self.put_raw(&esc)
                }
                // '/' and all UTF-8 continuation bytes pass through
                c => self.put(c),
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn add_quoted(&mut self, s: &str) -> bool {
        self.put(b'"') && self.add_escaped(s) && self.put(b'"')
    }

    /// Position for a value: separator, and the `"name" : ` prefix when
    /// inside an object. Fails with `NoContainer` at depth 0.
    fn begin_value(&mut self, name: &str) -> bool {
        if self.depth == 0 {
            return self.fail(WriteError::NoContainer);
        }
        if self.in_array() {
            self.next_element()
        } else {
            self.next_line_indent() && self.add_quoted(name) && self.put_raw(b" : ")
        }
    }

    fn commit(&mut self, prev: Prev) -> bool {
        self.has_value.set(self.depth);
        self.prev = prev;
        true
    }

    /// Open a container scope. `name` is emitted inside objects only.
    fn open_scope(&mut self, name: &str, array: bool) -> bool {
        if self.err.is_some() {
            return false;
        }
        let open = if array { b'[' } else { b'{' };
        if self.depth == 0 {
            // first push opens the root
            self.depth = 1;
            self.has_value.clear(1);
            if array {
                self.is_array.set(1);
            } else {
                self.is_array.clear(1);
            }
            self.prev = if array { Prev::Array } else { Prev::Object };
            return self.put(open);
        }
        if self.depth + 1 >= MAX_DEPTH {
            return self.fail(WriteError::TooDeep);
        }
        let ok = if self.in_array() {
            self.next_line_indent() && self.put(open)
        } else {
            self.next_line_indent()
                && self.add_quoted(name)
                && self.put_raw(if array { b" : [" } else { b" : {" })
        };
        if !ok {
            return false;
        }
        self.has_value.set(self.depth);
        self.depth += 1;
        self.has_value.clear(self.depth);
        if array {
            self.is_array.set(self.depth);
        } else {
            self.is_array.clear(self.depth);
        }
        self.prev = if array { Prev::Array } else { Prev::Object };
        true
    }

    fn push_scalar(&mut self, name: &str, body: &str, quoted: bool, prev: Prev) -> bool {
        if self.err.is_some() {
            return false;
        }
        let ok = self.begin_value(name)
            && if quoted {
                self.add_quoted(body)
            } else {
                self.put_raw(body.as_bytes())
            };
        ok && self.commit(prev)
    }

    // --- keyed pushes (the name is ignored inside arrays) ---

    /// Push a string value.
    pub fn push_str(&mut self, name: &str, value: &str) -> bool {
        self.push_scalar(name, value, true, Prev::Scalar)
    }

    /// Push an integer value (covers both 32- and 64-bit).
    pub fn push_int(&mut self, name: &str, value: i64) -> bool {
        self.push_scalar(name, &value.to_string(), false, Prev::Scalar)
    }

    /// Push a 64-bit float, rendered at double precision.
    pub fn push_float(&mut self, name: &str, value: f64) -> bool {
        let text = number::format_float(value, DOUBLE_PRECISION);
        self.push_scalar(name, &text, false, Prev::Scalar)
    }

    /// Push a 32-bit float, rendered at single precision.
    pub fn push_float32(&mut self, name: &str, value: f32) -> bool {
        let text = number::format_float32(value, SINGLE_PRECISION);
        self.push_scalar(name, &text, false, Prev::Scalar)
    }

    /// Push a boolean value.
    pub fn push_bool(&mut self, name: &str, value: bool) -> bool {
        self.push_scalar(name, if value { "true" } else { "false" }, false, Prev::Scalar)
    }

    /// Push a named null value.
    pub fn push_null(&mut self, name: &str) -> bool {
        self.push_scalar(name, "null", false, Prev::Scalar)
    }

    /// Push an unnamed placeholder null.
    pub fn push_null_anon(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.depth == 0 {
            return self.fail(WriteError::NoContainer);
        }
        let ok = if self.in_array() {
            self.next_element()
        } else {
            self.next_line_indent()
        };
        ok && self.put_raw(b"null") && self.commit(Prev::Scalar)
    }

    /// Open an object; at depth 0 this opens the root and ignores the
    /// name.
    pub fn push_object(&mut self, name: &str) -> bool {
        self.open_scope(name, false)
    }

    /// Open an array; at depth 0 this opens a root array.
    pub fn push_array(&mut self, name: &str) -> bool {
        self.open_scope(name, true)
    }

    // --- array elements (enforce array context) ---

    fn require_array(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.in_array() {
            return self.fail(WriteError::NotArray);
        }
        true
    }

    /// Add a string element to the open array.
    pub fn element_str(&mut self, value: &str) -> bool {
        self.require_array() && self.push_str("", value)
    }

    /// Add an integer element to the open array.
    pub fn element_int(&mut self, value: i64) -> bool {
        self.require_array() && self.push_int("", value)
    }

    /// Add a 64-bit float element to the open array.
    pub fn element_float(&mut self, value: f64) -> bool {
        self.require_array() && self.push_float("", value)
    }

    /// Add a 32-bit float element to the open array.
    pub fn element_float32(&mut self, value: f32) -> bool {
        self.require_array() && self.push_float32("", value)
    }

    /// Add a boolean element to the open array.
    pub fn element_bool(&mut self, value: bool) -> bool {
        self.require_array() && self.push_bool("", value)
    }

    /// Add a null element to the open array.
    pub fn element_null(&mut self) -> bool {
        self.require_array() && self.push_null_anon()
    }

    /// Open an object element inside the open array.
    pub fn element_object(&mut self) -> bool {
        self.require_array() && self.push_object("")
    }

    /// Open an array element inside the open array.
    pub fn element_array(&mut self) -> bool {
        self.require_array() && self.push_array("")
    }

    /// Close the innermost object or array. Closing the root appends the
    /// final newline.
    pub fn close(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.depth == 0 {
            return self.fail(WriteError::NoContainer);
        }
        let was_array = self.is_array.get(self.depth);
        let had_value = self.has_value.get(self.depth);
        let nested_end = matches!(self.prev, Prev::ObjectEnd | Prev::ArrayEnd);
        self.depth -= 1;
        let ok = if was_array {
            if (had_value && self.column > MAX_ARRAY_COLUMN) || nested_end {
                self.new_line() && self.add_indent()
            } else {
                self.put(b' ')
            }
        } else if had_value || nested_end {
            self.new_line() && self.add_indent()
        } else {
            self.put(b' ')
        };
        if !ok {
            return false;
        }
        self.prev = if was_array {
            Prev::ArrayEnd
        } else {
            Prev::ObjectEnd
        };
        if !self.put(if was_array { b']' } else { b'}' }) {
            return false;
        }
        if self.depth == 0 {
            return self.new_line();
        }
        true
    }

    /// Verify everything is closed and flush the buffer to the sink.
    pub fn finish(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.depth != 0 {
            let err = if self.in_array() {
                WriteError::UnclosedArray
            } else {
                WriteError::UnclosedObject
            };
            return self.fail(err);
        }
        self.flush_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(w: JsonWriter<Vec<u8>>) -> String {
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_single_value_object() {
        let mut w = JsonWriter::new(Vec::new());
        assert!(w.push_object("r"));
        assert!(w.push_float("n", 3.14));
        assert!(w.close());
        assert!(w.finish());
        assert_eq!(output(w), "{\n  \"n\" : 3.14\n}\n");
    }

    #[test]
    fn test_nested_object_and_array() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_str("name", "demo");
        w.push_array("values");
        w.element_int(1);
        w.element_int(2);
        w.element_null();
        w.close();
        w.push_object("inner");
        w.push_bool("flag", false);
        w.close();
        w.close();
        assert!(w.finish());
        assert_eq!(
            output(w),
            concat!(
                "{\n",
                "  \"name\" : \"demo\",\n",
                "  \"values\" : [ 1, 2, null ],\n",
                "  \"inner\" : {\n",
                "    \"flag\" : false\n",
                "  }\n",
                "}\n",
            )
        );
    }

    #[test]
    fn test_root_array() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_array("");
        w.element_str("a");
        w.element_bool(true);
        w.close();
        assert!(w.finish());
        assert_eq!(output(w), "[ \"a\", true ]\n");
    }

    #[test]
    fn test_empty_containers() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_object("o");
        w.close();
        w.push_array("a");
        w.close();
        w.close();
        assert!(w.finish());
        assert_eq!(
            output(w),
            "{\n  \"o\" : { },\n  \"a\" : [ ]\n}\n"
        );
    }

    #[test]
    fn test_escaping() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_str("s", "a\"b\\c\nd\x01e/f");
        w.close();
        assert!(w.finish());
        assert_eq!(
            output(w),
            "{\n  \"s\" : \"a\\\"b\\\\c\\nd\\u0001e/f\"\n}\n"
        );
    }

    #[test]
    fn test_long_array_wraps() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_array("a");
        for i in 0..120 {
            assert!(w.element_int(i));
        }
        w.close();
        w.close();
        assert!(w.finish());
        let text = output(w);
        // wrapped past the ~200 column threshold
        assert!(text.lines().count() > 4);
        assert!(text.lines().all(|l| l.len() <= MAX_ARRAY_COLUMN + 8));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["a"].as_array().unwrap().len(), 120);
    }

    #[test]
    fn test_element_outside_array_latches() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        assert!(!w.element_int(1));
        assert!(matches!(w.last_error(), Some(WriteError::NotArray)));
        // latched: everything else is a no-op
        assert!(!w.push_int("x", 2));
        assert!(!w.close());
        assert!(!w.finish());
    }

    #[test]
    fn test_push_without_root_fails() {
        let mut w = JsonWriter::new(Vec::new());
        assert!(!w.push_int("x", 1));
        assert!(matches!(w.last_error(), Some(WriteError::NoContainer)));
    }

    #[test]
    fn test_finish_with_open_scope_fails() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_array("a");
        assert!(!w.finish());
        assert!(matches!(w.last_error(), Some(WriteError::UnclosedArray)));
    }

    #[test]
    fn test_close_underflow_fails() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.close();
        assert!(!w.close());
        assert!(matches!(w.last_error(), Some(WriteError::NoContainer)));
    }

    #[test]
    fn test_custom_indent() {
        let mut w = JsonWriter::new(Vec::new());
        w.set_indent("\t");
        w.push_object("");
        w.push_int("x", 1);
        w.close();
        assert!(w.finish());
        assert_eq!(output(w), "{\n\t\"x\" : 1\n}\n");
    }

    #[test]
    fn test_deep_nesting_latches_too_deep() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        for i in 0..300 {
            if !w.push_object(&format!("k{i}")) {
                break;
            }
        }
        assert!(matches!(w.last_error(), Some(WriteError::TooDeep)));
    }

    #[test]
    fn test_buffer_flush_on_large_output() {
        let mut w = JsonWriter::new(Vec::new());
        w.push_object("");
        w.push_array("a");
        for _ in 0..2000 {
            w.element_str("some padding text");
        }
        w.close();
        w.close();
        assert!(w.finish());
        let text = output(w);
        assert!(text.len() > BUFFER_SIZE);
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn test_sink_error_latches_io() {
        struct FailSink;
        impl Write for FailSink {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("down"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut w = JsonWriter::new(FailSink);
        w.push_object("");
        // fill far past the buffer to force a flush
        for i in 0..4000 {
            if !w.push_int(&format!("k{i}"), 1) {
                break;
            }
        }
        assert!(matches!(w.last_error(), Some(WriteError::Io(_))));
    }
}
