//! # Keyed Commitments: HMAC-SHA-256 Over Canonical Bytes
//!
//! A commitment binds canonical content to a secret key. Plain hashing of
//! low-entropy content (a birth year, a yes/no flag) can be reversed by
//! enumeration; keying the hash with a server secret prevents that.
//!
//! ## Security Invariants
//!
//! - Keys shorter than [`MIN_COMMITMENT_KEY_LEN`] bytes are rejected at
//!   construction of [`CommitmentKey`], before any hashing happens.
//! - Key bytes never appear in `Debug` output.
//! - Different keys over the same content yield different commitments, so
//!   key rotation observably changes every commitment.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::canonical::CanonicalBytes;
use crate::digest::{ContentDigest, DigestAlgorithm};
use crate::error::CommitmentError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum HMAC key length in bytes.
pub const MIN_COMMITMENT_KEY_LEN: usize = 32;

/// A validated HMAC commitment key (at least 32 bytes).
#[derive(Clone)]
pub struct CommitmentKey(Vec<u8>);

impl CommitmentKey {
    /// Validate and wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::KeyTooShort`] if `key` has fewer than
    /// [`MIN_COMMITMENT_KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CommitmentError> {
        if key.len() < MIN_COMMITMENT_KEY_LEN {
            return Err(CommitmentError::KeyTooShort {
                min: MIN_COMMITMENT_KEY_LEN,
                actual: key.len(),
            });
        }
        Ok(Self(key.to_vec()))
    }

    /// Parse a key from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CommitmentError> {
        let bytes = crate::digest::hex_to_bytes(hex).map_err(CommitmentError::InvalidKey)?;
        Self::new(&bytes)
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a key is never empty once constructed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for CommitmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommitmentKey(<{} bytes>)", self.0.len())
    }
}

/// Compute an HMAC-SHA-256 commitment over canonical bytes.
pub fn hmac_commitment(data: &CanonicalBytes, key: &CommitmentKey) -> Result<ContentDigest, CommitmentError> {
    let mut mac = HmacSha256::new_from_slice(&key.0)
        .map_err(|e| CommitmentError::InvalidKey(e.to_string()))?;
    mac.update(data.as_bytes());
    let tag = mac.finalize().into_bytes();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&tag);
    Ok(ContentDigest::new(DigestAlgorithm::HmacSha256, bytes))
}

/// Canonicalize raw JSON text and return its hex HMAC-SHA-256 commitment.
///
/// The key length is checked first; a short key fails without parsing or
/// hashing the input.
pub fn canonicalize_and_commit(raw: &[u8], key: &[u8]) -> Result<String, CommitmentError> {
    let key = CommitmentKey::new(key)?;
    let canonical = CanonicalBytes::from_json_slice(raw)?;
    Ok(hmac_commitment(&canonical, &key)?.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CanonicalizationError;

    const KEY_A: [u8; 32] = [0x11; 32];
    const KEY_B: [u8; 32] = [0x22; 32];

    #[test]
    fn short_key_rejected() {
        for len in [0usize, 1, 16, 31] {
            let key = vec![0xaa; len];
            let err = canonicalize_and_commit(br#"{"a":1}"#, &key).unwrap_err();
            assert!(matches!(err, CommitmentError::KeyTooShort { actual, .. } if actual == len));
        }
    }

    #[test]
    fn short_key_rejected_before_parsing() {
        // Invalid JSON with a short key reports the key, not the JSON.
        let err = canonicalize_and_commit(b"not json", &[1u8; 8]).unwrap_err();
        assert!(matches!(err, CommitmentError::KeyTooShort { .. }));
    }

    #[test]
    fn thirty_two_byte_key_accepted() {
        let out = canonicalize_and_commit(br#"{"a":1}"#, &KEY_A).unwrap();
        assert_eq!(out.len(), 64);
    }

    #[test]
    fn longer_key_accepted() {
        assert!(canonicalize_and_commit(br#"{"a":1}"#, &[7u8; 64]).is_ok());
    }

    #[test]
    fn different_keys_different_commitments() {
        let a = canonicalize_and_commit(br#"{"a":1}"#, &KEY_A).unwrap();
        let b = canonicalize_and_commit(br#"{"a":1}"#, &KEY_B).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn commitment_differs_from_plain_hash() {
        let commit = canonicalize_and_commit(br#"{"a":1}"#, &KEY_A).unwrap();
        let hash = crate::canonical::canonicalize_and_hash(br#"{"a":1}"#).unwrap();
        assert_ne!(commit, hash);
    }

    #[test]
    fn key_order_does_not_affect_commitment() {
        let a = canonicalize_and_commit(br#"{"a":1,"b":[1,2]}"#, &KEY_A).unwrap();
        let b = canonicalize_and_commit(br#"{"b":[1,2],"a":1}"#, &KEY_A).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_data_propagates() {
        let err = canonicalize_and_commit(br#"{"a":1} x"#, &KEY_A).unwrap_err();
        assert!(matches!(
            err,
            CommitmentError::Canonicalization(CanonicalizationError::TrailingData)
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let key = CommitmentKey::new(&KEY_A).unwrap();
        let dbg = format!("{key:?}");
        assert_eq!(dbg, "CommitmentKey(<32 bytes>)");
    }

    #[test]
    fn from_hex_validates_length() {
        assert!(CommitmentKey::from_hex(&"ab".repeat(32)).is_ok());
        assert!(CommitmentKey::from_hex(&"ab".repeat(31)).is_err());
        assert!(CommitmentKey::from_hex("zz").is_err());
    }

    #[test]
    fn commitment_tagged_hmac() {
        let key = CommitmentKey::new(&KEY_A).unwrap();
        let cb = CanonicalBytes::new(&serde_json::json!({"x": true})).unwrap();
        let digest = hmac_commitment(&cb, &key).unwrap();
        assert_eq!(digest.algorithm, DigestAlgorithm::HmacSha256);
    }
}
