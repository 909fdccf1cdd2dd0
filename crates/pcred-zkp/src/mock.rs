//! # Mock Proof Backend
//!
//! A deterministic, transparent proof backend for development and tests.
//!
//! ```text
//! proof = SHA256( canonical({"circuitId": ..., "publicInputs": ...}) )
//! ```
//!
//! [`MockProofVerifier::prove()`] produces such a proof and
//! [`ProofVerificationService::verify_proof()`] recomputes it and compares
//! in constant time. Different circuits with identical public inputs produce
//! different proofs.
//!
//! ## Security Warning
//!
//! **NOT PRIVATE.** Anyone can recompute the proof from the public inputs.
//! The mock proves nothing about hidden attributes.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pcred_core::{bytes_to_hex, sha256_digest, CancellationSignal, CanonicalBytes, CanonicalizationError};
use serde_json::{json, Value};

use crate::traits::{ProofServiceError, ProofVerificationRequest, ProofVerificationService};

/// Deterministic mock of the external proof verifier.
///
/// Counts verification calls so tests can assert that a request was
/// rejected before reaching the proof service.
#[derive(Debug, Default)]
pub struct MockProofVerifier {
    calls: AtomicUsize,
}

impl MockProofVerifier {
    /// A new verifier with a zero call count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the mock proof for `public_inputs` under `circuit_id`.
    pub fn prove(circuit_id: &str, public_inputs: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        let canonical = CanonicalBytes::from_value(&json!({
            "circuitId": circuit_id,
            "publicInputs": public_inputs,
        }))?;
        Ok(sha256_digest(&canonical).bytes.to_vec())
    }

    /// Number of `verify_proof` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProofVerificationService for MockProofVerifier {
    async fn verify_proof(
        &self,
        request: &ProofVerificationRequest,
        cancel: &CancellationSignal,
    ) -> Result<bool, ProofServiceError> {
        cancel.check()?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        let expected = Self::prove(&request.circuit_id, &request.public_inputs)
            .map_err(|e| ProofServiceError::Rejected(e.to_string()))?;
        if request.proof.len() != expected.len() {
            return Ok(false);
        }
        Ok(pcred_core::constant_time_eq_hex(
            &bytes_to_hex(&request.proof),
            &bytes_to_hex(&expected),
        ))
    }
}
