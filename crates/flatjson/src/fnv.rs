//! 32-bit FNV-1a hashing.
//!
//! Key hashes stored in items are computed over the *encoded* UTF-8 form
//! of the key, so a caller holding a decoded `&str` can reproduce them
//! with [`fnv1a`].

use crate::text;

pub const FNV1A_SEED: u32 = 2_166_136_261;
pub const FNV1A_PRIME: u32 = 16_777_619;

/// FNV-1a over raw bytes.
#[inline]
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV1A_SEED;
    for &b in bytes {
        hash = (hash ^ u32::from(b)).wrapping_mul(FNV1A_PRIME);
    }
    hash
}

/// FNV-1a of a raw (still escaped) JSON key, hashed over its decoded and
/// UTF-8 re-encoded bytes. `fnv1a(decoded.as_bytes())` produces the same
/// value.
#[must_use]
pub(crate) fn hash_key(raw: &[u8], surrogate_pairs: bool) -> u32 {
    let mut hash = FNV1A_SEED;
    let mut pos = 0;
    let mut buf = [0u8; 4];
    while pos < raw.len() {
        let (c, consumed) = text::next_codepoint(&raw[pos..], surrogate_pairs);
        pos += consumed;
        for &b in text::scalar(c).encode_utf8(&mut buf).as_bytes() {
            hash = (hash ^ u32::from(b)).wrapping_mul(FNV1A_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        // published FNV-1a 32-bit test vectors
        assert_eq!(fnv1a(b""), 0x811C_9DC5);
        assert_eq!(fnv1a(b"a"), 0xE40C_292C);
        assert_eq!(fnv1a(b"b"), 0xE70C_2DE5);
        assert_eq!(fnv1a(b"foobar"), 0xBF9C_F968);
    }

    #[test]
    fn test_hash_key_matches_decoded_form() {
        assert_eq!(hash_key(b"name", true), fnv1a(b"name"));
        // escaped and literal forms of the same key hash identically
        assert_eq!(hash_key(br"\u0041", true), fnv1a(b"A"));
        assert_eq!(
            hash_key(br"\uD83D\uDE00", true),
            fnv1a("\u{1F600}".to_string().as_bytes())
        );
    }
}
