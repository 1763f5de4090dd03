//! Keccak-256 helpers for state commitments and Merkle nodes.

use tiny_keccak::{Hasher, Keccak};

/// Compute the keccak256 hash of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Hash of an inner Merkle node: `keccak256(left ∥ right)`.
#[must_use]
pub fn hash_pair(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // Well-known keccak256("") digest.
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_pair_matches_concat() {
        let a = [0x11u8; 32];
        let b = [0x22u8; 32];
        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(&a);
        concat[32..].copy_from_slice(&b);
        assert_eq!(hash_pair(&a, &b), keccak256(&concat));
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}
