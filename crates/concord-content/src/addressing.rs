use sha2::{Digest, Sha256};

use concord_types::ContentHash;

/// Deterministic SHA-256 digest of an insight payload. Same payload, same
/// hash, regardless of caller; no timestamps or salts enter the input.
pub fn hash(payload: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(payload).into())
}

/// Recompute and compare. The comparison visits every byte so equal-length
/// inputs take the same path regardless of where they diverge.
pub fn verify(payload: &[u8], expected: &ContentHash) -> bool {
    ct_eq(hash(payload).as_bytes(), expected.as_bytes())
}

fn ct_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
