// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content hashing for cache keys.

use sha2::{Digest, Sha256};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Digest used to key the content cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    /// 32-bit FNV-1a. Deterministic but not collision resistant; only for
    /// builds without a cryptographic digest.
    Fnv1a,
}

/// Hex digest of raw file bytes
pub fn content_hash(bytes: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => sha256_hex(bytes),
        HashAlgorithm::Fnv1a => format!("{:08x}", fnv1a_32(bytes)),
    }
}

/// SHA-256, lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sha256_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
    }

    #[test]
    fn test_fnv_known_values() {
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(content_hash(b"", HashAlgorithm::Fnv1a), "811c9dc5");
    }

    proptest! {
        #[test]
        fn fnv_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(fnv1a_32(&bytes), fnv1a_32(&bytes));
        }

        #[test]
        fn fnv_separates_same_length_inputs(
            a in proptest::collection::vec(any::<u8>(), 16),
            b in proptest::collection::vec(any::<u8>(), 16),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(fnv1a_32(&a), fnv1a_32(&b));
        }
    }
}
