//! Common cryptography helper functions for Arbor

use crate::hash::Hash;
use blake2::{digest::consts::U32, Blake2b, Digest};

/// Get a Blake2b-256 hash of a byte string
pub fn blake2b_256(data: &[u8]) -> Hash<32> {
    blake2b_256_parts(&[data])
}

/// Get a Blake2b-256 hash over the concatenation of several byte strings
pub fn blake2b_256_parts(parts: &[&[u8]]) -> Hash<32> {
    let mut hasher = Blake2b::<U32>::new();
    for part in parts {
        hasher.update(part);
    }
    Hash::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_hash_like_concatenation() {
        assert_eq!(blake2b_256_parts(&[b"ab", b"cd"]), blake2b_256(b"abcd"));
        assert_ne!(blake2b_256(b"abcd"), blake2b_256(b"abce"));
    }

    #[test]
    fn empty_input_is_known_digest() {
        assert_eq!(
            blake2b_256(&[]).to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }
}
