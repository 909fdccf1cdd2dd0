//! # Proof Verification Interface
//!
//! The external proof verifier is a black box: it receives a circuit
//! identifier, a verification key reference, opaque proof bytes and the
//! public inputs, and answers yes or no.
//!
//! ## Security Invariant
//!
//! Callers build `public_inputs` from values they recomputed themselves.
//! Implementations treat `Ok(false)` as a definitive rejection and `Err` as
//! "no answer"; a caller must never map an `Err` to a valid outcome.

use async_trait::async_trait;
use pcred_core::{CancellationSignal, Cancelled};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One verification call to the external proof service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofVerificationRequest {
    /// Circuit the proof was generated for.
    pub circuit_id: String,
    /// Reference to the circuit's verification key.
    pub verification_key_id: String,
    /// Opaque proof bytes.
    #[serde(skip)]
    pub proof: Vec<u8>,
    /// Public inputs, as recomputed by the caller.
    pub public_inputs: Value,
}

/// Failure to obtain a verdict from the proof service.
#[derive(Error, Debug)]
pub enum ProofServiceError {
    /// The service could not be reached or did not answer.
    #[error("proof service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request as malformed (unknown circuit, bad
    /// proof encoding).
    #[error("proof request rejected: {0}")]
    Rejected(String),

    /// The caller cancelled the call.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// The external proof-verification call.
#[async_trait]
pub trait ProofVerificationService: Send + Sync {
    /// Verify `request.proof` against `request.public_inputs`.
    async fn verify_proof(
        &self,
        request: &ProofVerificationRequest,
        cancel: &CancellationSignal,
    ) -> Result<bool, ProofServiceError>;
}
