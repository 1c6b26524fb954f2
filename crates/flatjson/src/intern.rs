//! String interning for the build passes.
//!
//! An open hash table with separate chaining over plain `Vec`s. Entries
//! hold the FNV-1a hash of the *raw* (still escaped) source bytes plus
//! the source range, so deduplication never allocates per string. The
//! table is sized once from the pre-counted number of quoted occurrences
//! in the input.

use crate::error::ErrorKind;
use crate::fnv::fnv1a;
use crate::options::StringEncoding;
use crate::text;
use std::ops::Range;

/// Strings per hash table slot; larger trades speed for scratch memory.
const HASH_COUNT_DIV: usize = 4;

/// Final blob position of one unique string.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StrOffset {
    /// Byte offset from the start of the string blob.
    pub offset: u32,
    /// Encoded byte length, excluding the terminator.
    pub len: u32,
}

struct Entry {
    hash: u32,
    start: u32,
    len: u32,
    /// 0 = end of chain, otherwise entry index + 1.
    next: u32,
}

pub(crate) struct InternTable {
    /// Slot -> entry index + 1; 0 = empty.
    slots: Vec<u32>,
    /// Unique strings in insertion order.
    entries: Vec<Entry>,
    /// Pre-counted occurrence bound; exceeding it is a builder bug.
    capacity: usize,
}

impl InternTable {
    pub fn new(occurrences: usize) -> Self {
        let table_size = (occurrences / HASH_COUNT_DIV).max(1024);
        InternTable {
            slots: vec![0u32; table_size],
            entries: Vec::with_capacity(occurrences),
            capacity: occurrences,
        }
    }

    /// Number of unique strings interned so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn slot_of(&self, hash: u32) -> usize {
        ((hash ^ hash.rotate_left(16)) as usize) % self.slots.len()
    }

    fn find(&self, src: &[u8], hash: u32, bytes: &[u8]) -> Option<usize> {
        let mut link = self.slots[self.slot_of(hash)];
        while link != 0 {
            let entry = &self.entries[link as usize - 1];
            if entry.hash == hash {
                let range = entry.start as usize..(entry.start + entry.len) as usize;
                if &src[range] == bytes {
                    return Some(link as usize - 1);
                }
            }
            link = entry.next;
        }
        None
    }

    /// Record one occurrence, inserting the string if it is new.
    pub fn count(&mut self, src: &[u8], range: Range<usize>) -> Result<(), ErrorKind> {
        let bytes = &src[range.clone()];
        let hash = fnv1a(bytes);
        if self.find(src, hash, bytes).is_some() {
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            return Err(ErrorKind::StringCountMismatch);
        }
        let slot = self.slot_of(hash);
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            hash,
            start: range.start as u32,
            len: range.len() as u32,
            next: self.slots[slot],
        });
        self.slots[slot] = index + 1;
        Ok(())
    }

    /// Index of a previously counted string.
    pub fn lookup(&self, src: &[u8], range: Range<usize>) -> Option<usize> {
        let bytes = &src[range];
        self.find(src, fnv1a(bytes), bytes)
    }

    /// Total encoded blob size including terminators.
    pub fn encoded_size(
        &self,
        src: &[u8],
        encoding: StringEncoding,
        surrogate_pairs: bool,
    ) -> usize {
        let term = text::terminator_len(encoding);
        self.entries
            .iter()
            .map(|e| {
                let range = e.start as usize..(e.start + e.len) as usize;
                text::encoded_len(&src[range], encoding, surrogate_pairs) + term
            })
            .sum()
    }

    /// Emit every unique string, in insertion order, into the blob region
    /// at the end of `out`. Returns the `(offset, length)` records that
    /// the fill pass resolves references through.
    pub fn finalize(
        &self,
        src: &[u8],
        encoding: StringEncoding,
        surrogate_pairs: bool,
        out: &mut Vec<u8>,
    ) -> Vec<StrOffset> {
        let blob_base = out.len();
        let mut offsets = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let range = e.start as usize..(e.start + e.len) as usize;
            let offset = (out.len() - blob_base) as u32;
            let len = text::encode_append(&src[range], encoding, surrogate_pairs, out) as u32;
            for _ in 0..text::terminator_len(encoding) {
                out.push(0);
            }
            offsets.push(StrOffset { offset, len });
        }
        offsets
    }
}
