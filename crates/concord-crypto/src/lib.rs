//! Signature verification for consensus records.
//!
//! Signatures bind an agent to both a specific record and its exact content:
//! the signed digest is `sha256(record_id || content_hash)`, so a signature
//! replayed against another record (or tampered content) never verifies.

use ed25519_dalek::{Signature, Signer, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use concord_types::{ContentHash, RecordId};

pub use ed25519_dalek::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH, SigningKey};

/// The message digest an agent signs when endorsing a record.
pub fn signing_digest(record_id: &RecordId, content_hash: &ContentHash) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record_id.as_bytes());
    hasher.update(content_hash.as_bytes());
    hasher.finalize().into()
}

/// Verify an Ed25519 signature over a digest. Pure function; malformed key or
/// signature bytes fail verification rather than erroring.
pub fn verify_signature(digest: &[u8; 32], signature: &[u8], public_key: &[u8; 32]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <&[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    let sig = Signature::from_bytes(sig_bytes);
    key.verify_strict(digest, &sig).is_ok()
}

/// Generate a fresh signing key. Client-side helper for agents, demos and
/// tests; the ledger itself only ever verifies.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Produce the signature bytes an agent submits for a record.
pub fn sign_digest(digest: &[u8; 32], key: &SigningKey) -> [u8; SIGNATURE_LENGTH] {
    key.sign(digest).to_bytes()
}

/// The verifying-key bytes to register in the agent directory.
pub fn public_key_bytes(key: &SigningKey) -> [u8; PUBLIC_KEY_LENGTH] {
    key.verifying_key().to_bytes()
}
