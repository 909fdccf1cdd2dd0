//! # pcred-zkp: Zero-Knowledge Presentation Support
//!
//! - **Traits** (`traits.rs`): [`ProofVerificationService`], the boundary to
//!   the external proof verifier. Circuit arithmetic lives behind it.
//! - **Challenge** (`challenge.rs`): server-issued challenge documents and
//!   their HMAC commitments. A proof is bound to a challenge through the
//!   commitment, which only the server can compute.
//! - **Mock** (`mock.rs`): [`MockProofVerifier`], a deterministic,
//!   transparent backend for development and tests.
//!
//! ## Security Invariant
//!
//! The mock backend provides no zero-knowledge guarantees. Anyone can
//! recompute a mock proof from its public inputs. It is behind the `mock`
//! feature and must never back a production verifier.
//!
//! ## Crate Policy
//!
//! - Depends on `pcred-core` only.
//! - No `unsafe`.

pub mod challenge;
#[cfg(feature = "mock")]
pub mod mock;
pub mod traits;

pub use challenge::{Challenge, ChallengeError, ChallengeIssuer, IssuedChallenge, DEFAULT_CHALLENGE_TTL_SECS};
#[cfg(feature = "mock")]
pub use mock::MockProofVerifier;
pub use traits::{ProofServiceError, ProofVerificationRequest, ProofVerificationService};
