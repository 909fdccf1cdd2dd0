//! # pcred-core: Foundational Types for Policy Credentials
//!
//! Every other crate in the workspace depends on `pcred-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL digest, commitment, and signature
//!    computation flows through `CanonicalBytes`. No raw `serde_json::to_vec()`
//!    for hashing. Two documents that differ only in key order or string
//!    escaping produce identical canonical bytes.
//!
//! 2. **Raw text keeps its numbers.** [`CanonicalBytes::from_json_slice()`]
//!    preserves the literal numeric form of its input, so `1` and `1.0`
//!    hash differently. [`CanonicalBytes::new()`] accepts already-decoded
//!    values, where numeric normalization has already happened.
//!
//! 3. **Keyed commitments refuse short keys.** [`CommitmentKey`] cannot be
//!    constructed from fewer than 32 bytes.
//!
//! 4. **Stable reason codes.** [`ReasonCode`] carries a fixed integer and
//!    string for every outcome. Codes are appended, never renumbered.
//!
//! 5. **Newtype identifiers.** `PolicyId`, `SubjectId`, `CredentialId`,
//!    `KeyId`; no bare strings crossing crate boundaries.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pcred-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod cancel;
pub mod canonical;
pub mod commitment;
pub mod digest;
pub mod error;
pub mod identity;
pub mod reason;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use cancel::CancellationSignal;
pub use canonical::{canonicalize_and_hash, CanonicalBytes};
pub use commitment::{canonicalize_and_commit, hmac_commitment, CommitmentKey, MIN_COMMITMENT_KEY_LEN};
pub use digest::{bytes_to_hex, constant_time_eq_hex, hex_to_bytes, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{Cancelled, CanonicalizationError, CommitmentError, CryptoError, PcredError};
pub use identity::{CredentialId, KeyId, PolicyId, PolicyVersion, SubjectId};
pub use reason::ReasonCode;
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
