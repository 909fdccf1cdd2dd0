//! # ZKP Verifier
//!
//! Verifies a zero-knowledge presentation bound to a server challenge:
//!
//! ```json
//! {
//!   "proof": "<base64url>",
//!   "challenge": {"challengeId": "...", "nonce": "...", "policyId": "...",
//!                 "issuedAt": "...", "expiresAt": "..."},
//!   "policyVersion": 1,
//!   "publicInputs": {"challengeCommitment": "<hex>", "policyHash": "<hex>",
//!                    "sessionTag": "..."}
//! }
//! ```
//!
//! | # | Check | Failure |
//! |---|---|---|
//! | 1 | body parses, proof decodes | `MALFORMED_PRESENTATION` |
//! | 2 | recomputed challenge commitment equals the declared one | `PUBLIC_INPUT_MISMATCH` |
//! | 3 | challenge not expired | `CHALLENGE_EXPIRED` |
//! | 4 | policy resolves, a pinned version is current or compatible, status is active or deprecated | `PolicyNotFound` / `PolicyHashMismatch` / `PolicyInactive` |
//! | 5 | recomputed policy hash equals the declared one | `PUBLIC_INPUT_MISMATCH` |
//! | 6 | recomputed inputs satisfy the policy's public-signals schema | `PUBLIC_INPUT_MISMATCH` |
//! | 7 | proof service accepts the proof within the timeout | `PROOF_INVALID` / `INTERNAL_ERROR` |
//!
//! ## Security Invariants
//!
//! - The proof service receives only recomputed public inputs. Declared
//!   inputs are compared against them and then discarded, so a client
//!   cannot substitute inputs for which it holds a valid proof.
//! - Hash comparisons run in constant time.
//! - Checks 1 to 6 fail before any call to the proof service.
//! - A timeout or service failure never yields a valid result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pcred_core::{
    constant_time_eq_hex, CancellationSignal, Clock, CommitmentError, CommitmentKey, PolicyId, PolicyVersion, ReasonCode,
    SystemClock,
};
use pcred_policy::{PolicyDefinition, PolicyError, PolicyRegistry, PolicyStatus, RegistryError};
use pcred_zkp::{Challenge, ProofServiceError, ProofVerificationRequest, ProofVerificationService};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::request::{PresentationKind, Verdict};
use crate::verifier::{PresentationVerifier, VerifierError};

/// Default bound on one proof-service call.
pub const DEFAULT_PROOF_TIMEOUT: Duration = Duration::from_secs(5);

/// Public inputs as declared by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredPublicInputs {
    /// Hex HMAC commitment to the challenge.
    pub challenge_commitment: String,
    /// Hex policy hash.
    pub policy_hash: String,
    /// Optional session binding chosen by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_tag: Option<String>,
}

/// A ZKP presentation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkpPresentation {
    /// Base64url (no padding) proof bytes.
    pub proof: String,
    /// The server-issued challenge being answered.
    pub challenge: Challenge,
    /// Policy version the proof targets; the current version when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<PolicyVersion>,
    /// Public inputs the client claims the proof is bound to.
    pub public_inputs: DeclaredPublicInputs,
}

/// Build the public-input document the proof service sees.
pub fn public_inputs(challenge_commitment: &str, policy_hash: &str, session_tag: Option<&str>) -> Value {
    let mut inputs = Map::new();
    inputs.insert("challengeCommitment".into(), Value::String(challenge_commitment.to_string()));
    inputs.insert("policyHash".into(), Value::String(policy_hash.to_string()));
    if let Some(tag) = session_tag {
        inputs.insert("sessionTag".into(), Value::String(tag.to_string()));
    }
    Value::Object(inputs)
}

/// Configuration errors for [`ZkpVerifierConfig::from_env()`].
#[derive(Error, Debug)]
pub enum ZkpConfigError {
    /// `PCRED_CHALLENGE_KEY_HEX` is not set.
    #[error("PCRED_CHALLENGE_KEY_HEX is not set")]
    MissingChallengeKey,

    /// The challenge key is not valid hex or is too short.
    #[error("invalid challenge key: {0}")]
    InvalidChallengeKey(#[from] CommitmentError),

    /// `PCRED_PROOF_TIMEOUT_MS` is not a positive integer.
    #[error("invalid PCRED_PROOF_TIMEOUT_MS: {0:?}")]
    InvalidTimeout(String),
}

/// ZKP verifier settings.
///
/// `Debug` output never contains the challenge key.
#[derive(Debug, Clone)]
pub struct ZkpVerifierConfig {
    /// Server key for challenge commitments.
    pub challenge_key: CommitmentKey,
    /// Bound on one proof-service call.
    pub proof_timeout: Duration,
}

impl ZkpVerifierConfig {
    /// Settings with the default timeout.
    pub fn new(challenge_key: CommitmentKey) -> Self {
        Self {
            challenge_key,
            proof_timeout: DEFAULT_PROOF_TIMEOUT,
        }
    }

    /// Read `PCRED_CHALLENGE_KEY_HEX` (required) and
    /// `PCRED_PROOF_TIMEOUT_MS` (optional).
    pub fn from_env() -> Result<Self, ZkpConfigError> {
        Self::from_vars(
            std::env::var("PCRED_CHALLENGE_KEY_HEX").ok(),
            std::env::var("PCRED_PROOF_TIMEOUT_MS").ok(),
        )
    }

    fn from_vars(key_hex: Option<String>, timeout_ms: Option<String>) -> Result<Self, ZkpConfigError> {
        let key_hex = key_hex.ok_or(ZkpConfigError::MissingChallengeKey)?;
        let challenge_key = CommitmentKey::from_hex(&key_hex)?;
        let proof_timeout = match timeout_ms {
            None => DEFAULT_PROOF_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ZkpConfigError::InvalidTimeout(raw)),
            },
        };
        Ok(Self {
            challenge_key,
            proof_timeout,
        })
    }
}

/// Verifies ZKP presentations through an external proof service.
pub struct ZkpVerifier {
    policies: Arc<dyn PolicyRegistry>,
    proofs: Arc<dyn ProofVerificationService>,
    clock: Arc<dyn Clock>,
    config: ZkpVerifierConfig,
}

impl ZkpVerifier {
    /// A verifier with the system clock.
    pub fn new(
        policies: Arc<dyn PolicyRegistry>,
        proofs: Arc<dyn ProofVerificationService>,
        config: ZkpVerifierConfig,
    ) -> Self {
        Self {
            policies,
            proofs,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn reject(code: ReasonCode) -> Verdict {
        Verdict::reject(PresentationKind::Zkp, vec![code])
    }

    /// Resolve the policy the proof targets.
    ///
    /// The current record decides which versions are acceptable: a pinned
    /// version must be the current one or listed in its
    /// `compatibleVersions`.
    async fn resolve_policy(
        &self,
        presentation: &ZkpPresentation,
        cancel: &CancellationSignal,
    ) -> Result<Result<PolicyDefinition, ReasonCode>, VerifierError> {
        let policy_id = &presentation.challenge.policy_id;
        let Some(current) = self.lookup(policy_id, None, cancel).await? else {
            return Ok(Err(ReasonCode::PolicyNotFound));
        };
        let policy = match presentation.policy_version {
            None => current,
            Some(pinned) if pinned == current.version => current,
            Some(pinned) if current.compatible_versions.contains(&pinned) => {
                match self.lookup(policy_id, Some(pinned), cancel).await? {
                    Some(policy) => policy,
                    None => return Ok(Err(ReasonCode::PolicyNotFound)),
                }
            }
            Some(pinned) => {
                tracing::warn!(
                    policy_id = %policy_id,
                    pinned = %pinned,
                    current = %current.version,
                    "pinned policy version not compatible with current"
                );
                return Ok(Err(ReasonCode::PolicyHashMismatch));
            }
        };
        match policy.status {
            PolicyStatus::Active | PolicyStatus::Deprecated => Ok(Ok(policy)),
            PolicyStatus::Draft | PolicyStatus::Retired => Ok(Err(ReasonCode::PolicyInactive)),
        }
    }

    async fn lookup(
        &self,
        policy_id: &PolicyId,
        version: Option<PolicyVersion>,
        cancel: &CancellationSignal,
    ) -> Result<Option<PolicyDefinition>, VerifierError> {
        match cancel.guard(self.policies.get_policy(policy_id, version, cancel)).await? {
            Ok(found) => Ok(found),
            Err(RegistryError::NotFound { .. }) => Ok(None),
            Err(RegistryError::Cancelled(c)) => Err(c.into()),
            Err(e) => Err(VerifierError::Dependency(format!("policy lookup: {e}"))),
        }
    }
}

#[async_trait]
impl PresentationVerifier for ZkpVerifier {
    fn kind(&self) -> PresentationKind {
        PresentationKind::Zkp
    }

    async fn verify(&self, presentation: &Value, cancel: &CancellationSignal) -> Result<Verdict, VerifierError> {
        // 1. shape
        let Ok(presentation) = serde_json::from_value::<ZkpPresentation>(presentation.clone()) else {
            return Ok(Self::reject(ReasonCode::MalformedPresentation));
        };
        let proof = match URL_SAFE_NO_PAD.decode(presentation.proof.as_bytes()) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(Self::reject(ReasonCode::MalformedPresentation)),
        };
        let declared = &presentation.public_inputs;

        // 2. challenge commitment
        let commitment = presentation
            .challenge
            .commitment(&self.config.challenge_key)
            .map_err(|e| VerifierError::Dependency(format!("challenge commitment: {e}")))?;
        if !constant_time_eq_hex(&commitment, &declared.challenge_commitment) {
            tracing::warn!(challenge_id = %presentation.challenge.challenge_id, "challenge commitment mismatch");
            return Ok(Self::reject(ReasonCode::PublicInputMismatch));
        }

        // 3. challenge expiry
        if presentation.challenge.is_expired(self.clock.now()) {
            return Ok(Self::reject(ReasonCode::ChallengeExpired));
        }

        // 4. policy
        let policy = match self.resolve_policy(&presentation, cancel).await? {
            Ok(policy) => policy,
            Err(code) => return Ok(Self::reject(code)),
        };

        // 5. policy hash
        let policy_hash = policy
            .policy_hash()
            .map_err(|e| VerifierError::Dependency(format!("policy hash: {e}")))?;
        if !constant_time_eq_hex(&policy_hash, &declared.policy_hash) {
            tracing::warn!(policy_id = %policy.policy_id, "declared policy hash mismatch");
            return Ok(Self::reject(ReasonCode::PublicInputMismatch));
        }

        // 6. public-signals schema, over the recomputed inputs
        let inputs = public_inputs(&commitment, &policy_hash, declared.session_tag.as_deref());
        match policy.validate_public_signals(&inputs) {
            Ok(()) => {}
            Err(PolicyError::PublicSignalsRejected(violations)) => {
                tracing::info!(policy_id = %policy.policy_id, violations = violations.len(), "public signals rejected");
                return Ok(Self::reject(ReasonCode::PublicInputMismatch));
            }
            Err(e) => return Err(VerifierError::Dependency(format!("public signals schema: {e}"))),
        }

        // 7. proof service
        let request = ProofVerificationRequest {
            circuit_id: policy.circuit_id.clone(),
            verification_key_id: policy.verification_key_id.clone(),
            proof,
            public_inputs: inputs,
        };
        let call = cancel.guard(self.proofs.verify_proof(&request, cancel));
        let outcome = match tokio::time::timeout(self.config.proof_timeout, call).await {
            Ok(guarded) => guarded?,
            Err(_) => {
                tracing::error!(
                    circuit_id = %request.circuit_id,
                    timeout_ms = self.config.proof_timeout.as_millis() as u64,
                    "proof service timed out"
                );
                return Err(VerifierError::Dependency("proof service timed out".into()));
            }
        };
        match outcome {
            Ok(true) => Ok(Verdict::accept(PresentationKind::Zkp, None)),
            Ok(false) => Ok(Self::reject(ReasonCode::ProofInvalid)),
            Err(ProofServiceError::Cancelled(c)) => Err(c.into()),
            Err(e) => Err(VerifierError::Dependency(format!("proof service: {e}"))),
        }
    }
}
