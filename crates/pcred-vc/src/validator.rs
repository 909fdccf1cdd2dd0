//! # Credential Validation Pipeline
//!
//! [`CredentialValidator::validate()`] runs a strict, ordered pipeline.
//! Each stage either proceeds or ends validation with one reason code;
//! later stages never run after a failure.
//!
//! | # | Stage | Failure |
//! |---|---|---|
//! | 1 | three base64url JSON segments | `MalformedJwt` |
//! | 2 | `kid` header present | `MissingRequiredClaim` |
//! | 3 | key resolves | `UnknownKey` |
//! | 4 | key not retired | `RetiredKeyUsed` |
//! | 5 | signature verifies | `InvalidSignature` |
//! | 6 | `iat`, `exp` present | `MissingRequiredClaim` |
//! | 7 | `abs(now - iat) <= skew` | `ClockSkewExceeded` |
//! | 8 | `now >= nbf` | `NotYetValid` |
//! | 9 | `now < exp` | `Expired` |
//! | 10 | credential rebuilds from payload | `MissingRequiredClaim` / `MalformedJwt` |
//! | 11 | policy hash binds (only with a registry) | `PolicyNotFound` / `PolicyHashMismatch` |
//!
//! ## Security Invariants
//!
//! - Stage 4 runs before stage 5. A retired key is rejected even if the
//!   signature check were bypassed.
//! - Every failure is a value. Messages are generic and never include
//!   token contents or dependency error details.
//! - Collaborator failures (key service, registry) fail closed with
//!   `INTERNAL_ERROR`. Only cancellation escapes as an `Err`.

use std::sync::Arc;
use std::time::Duration;

use pcred_core::{
    constant_time_eq_hex, CancellationSignal, Cancelled, Clock, KeyId, ReasonCode, SystemClock, Timestamp,
};
use pcred_crypto::{verify_with_public_key, KeyManagementService, KeyServiceError, EDDSA_ALG};
use pcred_policy::{PolicyDefinition, PolicyRegistry, PolicyStatus, RegistryError};
use serde::Serialize;

use crate::credential::{epoch_claim, ClaimProblem, PolicyCredential};
use crate::token::DecodedToken;

/// Default clock-skew tolerance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Maximum allowed `abs(now - iat)`.
    pub clock_skew: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

impl ValidatorConfig {
    /// Read `PCRED_CLOCK_SKEW_SECS`, falling back to the default when unset
    /// or unparseable.
    pub fn from_env() -> Self {
        let clock_skew = std::env::var("PCRED_CLOCK_SKEW_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CLOCK_SKEW);
        Self { clock_skew }
    }
}

/// The outcome of validating one token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether the token is valid.
    pub valid: bool,
    /// Outcome code; `Valid` exactly when `valid` is true.
    pub reason: ReasonCode,
    /// Generic human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Key named by the token, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,
    /// The credential, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<PolicyCredential>,
    /// Validation time.
    pub timestamp_utc: Timestamp,
}

impl ValidationResult {
    fn fail(reason: ReasonCode, message: &str, key_id: Option<KeyId>, now: Timestamp) -> Self {
        Self {
            valid: false,
            reason,
            message: Some(message.to_string()),
            key_id,
            credential: None,
            timestamp_utc: now,
        }
    }
}

/// Validates compact credential tokens.
pub struct CredentialValidator {
    keys: Arc<dyn KeyManagementService>,
    policies: Option<Arc<dyn PolicyRegistry>>,
    clock: Arc<dyn Clock>,
    config: ValidatorConfig,
}

impl CredentialValidator {
    /// A validator with the system clock, default config and no policy
    /// binding.
    pub fn new(keys: Arc<dyn KeyManagementService>) -> Self {
        Self {
            keys,
            policies: None,
            clock: Arc::new(SystemClock),
            config: ValidatorConfig::default(),
        }
    }

    /// Enable the policy-binding stage.
    pub fn with_policy_registry(mut self, policies: Arc<dyn PolicyRegistry>) -> Self {
        self.policies = Some(policies);
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the config.
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate a compact token.
    pub async fn validate(&self, token: &str, cancel: &CancellationSignal) -> Result<ValidationResult, Cancelled> {
        cancel.check()?;
        let now = self.clock.now();
        let result = self.run(token, now, cancel).await?;
        if result.valid {
            tracing::debug!(key_id = ?result.key_id, "credential valid");
        } else {
            tracing::info!(reason = %result.reason, key_id = ?result.key_id, "credential rejected");
        }
        Ok(result)
    }

    async fn run(&self, token: &str, now: Timestamp, cancel: &CancellationSignal) -> Result<ValidationResult, Cancelled> {
        use ReasonCode::*;

        // 1. structure
        let decoded = match DecodedToken::decode(token) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(error = %e, "token decode failed");
                return Ok(ValidationResult::fail(MalformedJwt, "malformed token", None, now));
            }
        };

        // 2. kid
        let Some(key_id) = decoded.key_id() else {
            return Ok(ValidationResult::fail(MissingRequiredClaim, "missing key id", None, now));
        };
        let kid = Some(key_id.clone());

        // 3. key lookup
        let key = match cancel.guard(self.keys.key_by_id(&key_id, cancel)).await? {
            Ok(Some(key)) => key,
            Ok(None) => return Ok(ValidationResult::fail(UnknownKey, "unknown signing key", kid, now)),
            Err(KeyServiceError::Cancelled(c)) => return Err(c),
            Err(e) => {
                tracing::error!(key_id = %key_id, error = %e, "key lookup failed");
                return Ok(ValidationResult::fail(InternalError, "internal error", kid, now));
            }
        };

        // 4. retirement, before the signature
        if key.is_retired() {
            tracing::warn!(key_id = %key_id, "token signed with retired key");
            return Ok(ValidationResult::fail(RetiredKeyUsed, "signing key retired", kid, now));
        }

        // 5. signature
        if !signature_valid(&decoded, &key.public_key) {
            return Ok(ValidationResult::fail(InvalidSignature, "invalid signature", kid, now));
        }

        // 6. timing claims
        let (iat, exp, nbf) = match timing_claims(&decoded) {
            Ok(t) => t,
            Err(ClaimProblem::Missing(_)) => {
                return Ok(ValidationResult::fail(MissingRequiredClaim, "missing required claim", kid, now))
            }
            Err(ClaimProblem::Invalid(_)) => {
                return Ok(ValidationResult::fail(MalformedJwt, "malformed token", kid, now))
            }
        };

        // 7. clock skew
        let skew = i64::try_from(self.config.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if now.secs_since(&iat).saturating_abs() > skew {
            return Ok(ValidationResult::fail(ClockSkewExceeded, "clock skew exceeded", kid, now));
        }

        // 8. not before
        if nbf.is_some_and(|nbf| now < nbf) {
            return Ok(ValidationResult::fail(NotYetValid, "credential not yet valid", kid, now));
        }

        // 9. expiry
        if now >= exp {
            return Ok(ValidationResult::fail(Expired, "credential expired", kid, now));
        }

        // 10. rebuild
        let credential = match PolicyCredential::from_payload(&decoded.payload, key_id.clone()) {
            Ok(c) => c,
            Err(ClaimProblem::Missing(_)) => {
                return Ok(ValidationResult::fail(MissingRequiredClaim, "missing required claim", kid, now))
            }
            Err(ClaimProblem::Invalid(_)) => {
                return Ok(ValidationResult::fail(MalformedJwt, "malformed token", kid, now))
            }
        };

        // 11. policy binding
        if let Some(policies) = &self.policies {
            match bind_policy(policies.as_ref(), &credential, cancel).await {
                Ok(None) => {}
                Ok(Some(reason)) => {
                    let message = match reason {
                        PolicyNotFound => "policy not found",
                        _ => "policy hash mismatch",
                    };
                    return Ok(ValidationResult::fail(reason, message, kid, now));
                }
                Err(RegistryError::Cancelled(c)) => return Err(c),
                Err(e) => {
                    tracing::error!(policy_id = %credential.policy_id, error = %e, "policy lookup failed");
                    return Ok(ValidationResult::fail(InternalError, "internal error", kid, now));
                }
            }
        }

        Ok(ValidationResult {
            valid: true,
            reason: Valid,
            message: None,
            key_id: kid,
            credential: Some(credential),
            timestamp_utc: now,
        })
    }
}

impl std::fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialValidator")
            .field("config", &self.config)
            .field("policy_binding", &self.policies.is_some())
            .finish_non_exhaustive()
    }
}

fn signature_valid(decoded: &DecodedToken, public_key: &pcred_crypto::Ed25519PublicKey) -> bool {
    if decoded.algorithm() != Some(EDDSA_ALG) {
        return false;
    }
    let Some(signature) = decoded.ed25519_signature() else {
        return false;
    };
    let Ok(input) = decoded.signing_input() else {
        return false;
    };
    verify_with_public_key(&input, &signature, public_key).is_ok()
}

fn timing_claims(decoded: &DecodedToken) -> Result<(Timestamp, Timestamp, Option<Timestamp>), ClaimProblem> {
    let iat = epoch_claim(&decoded.payload, "iat")?.ok_or(ClaimProblem::Missing("iat"))?;
    let exp = epoch_claim(&decoded.payload, "exp")?.ok_or(ClaimProblem::Missing("exp"))?;
    let nbf = epoch_claim(&decoded.payload, "nbf")?;
    Ok((iat, exp, nbf))
}

/// Check the credential's policy hash against the current record and its
/// compatible versions. Retired versions never match.
async fn bind_policy(
    policies: &dyn PolicyRegistry,
    credential: &PolicyCredential,
    cancel: &CancellationSignal,
) -> Result<Option<ReasonCode>, RegistryError> {
    let policy_id = &credential.policy_id;
    let Some(current) = cancel.guard(policies.get_policy(policy_id, None, cancel)).await?? else {
        return Ok(Some(ReasonCode::PolicyNotFound));
    };

    let mut candidates: Vec<PolicyDefinition> = Vec::with_capacity(1 + current.compatible_versions.len());
    for version in &current.compatible_versions {
        if let Some(def) = cancel.guard(policies.get_policy(policy_id, Some(*version), cancel)).await?? {
            candidates.push(def);
        }
    }
    candidates.push(current);

    let matched = candidates.iter().any(|def| {
        def.status != PolicyStatus::Retired
            && def
                .policy_hash()
                .map(|h| constant_time_eq_hex(&h, &credential.policy_hash))
                .unwrap_or(false)
    });
    Ok(if matched { None } else { Some(ReasonCode::PolicyHashMismatch) })
}
