//! # Credential Issuance
//!
//! [`CredentialIssuer::issue()`] resolves the policy and the current signing
//! key, builds a [`PolicyCredential`] bound to the policy hash, has it
//! signed, and returns the compact token.
//!
//! ## Failure Order
//!
//! 1. Policy absent: [`IssuanceError::PolicyNotFound`].
//! 2. Policy not `Active`: [`IssuanceError::PolicyInactive`].
//! 3. No current signing key, or the key service offers a retired one:
//!    [`IssuanceError::NoSigningKey`], a configuration error rather than a
//!    client error.
//! 4. Custom expiry not after issuance, or `notBefore` earlier than
//!    issuance: [`IssuanceError::InvalidExpiry`] /
//!    [`IssuanceError::InvalidNotBefore`].
//!
//! Issuance writes nothing. Recording the issuance event is the caller's
//! job.

use std::sync::Arc;

use pcred_core::{
    CancellationSignal, Cancelled, CanonicalizationError, Clock, CredentialId, PolicyId, PolicyVersion, ReasonCode,
    SubjectId, SystemClock, Timestamp,
};
use pcred_crypto::{CredentialSigner, KeyManagementService, KeyServiceError};
use pcred_policy::{PolicyError, PolicyRegistry, PolicyStatus, RegistryError};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::credential::PolicyCredential;
use crate::token::{self, TokenError};

/// Input to [`CredentialIssuer::issue()`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Policy to issue under.
    pub policy_id: PolicyId,
    /// Pin a specific policy version instead of the latest active one.
    pub policy_version: Option<PolicyVersion>,
    /// Pseudonymous subject.
    pub subject_id: SubjectId,
    /// Attribute claims.
    pub claims: Map<String, Value>,
    /// Optional device binding.
    pub device_tag: Option<String>,
    /// Override the policy's default lifetime.
    pub custom_expiry: Option<Timestamp>,
    /// Optional start of validity.
    pub not_before: Option<Timestamp>,
}

impl IssueRequest {
    /// A request with no optional fields set.
    pub fn new(policy_id: PolicyId, subject_id: SubjectId, claims: Map<String, Value>) -> Self {
        Self {
            policy_id,
            policy_version: None,
            subject_id,
            claims,
            device_tag: None,
            custom_expiry: None,
            not_before: None,
        }
    }
}

/// The result of a successful issuance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    /// Compact signed token.
    pub token: String,
    /// Hash over the credential's non-repudiable fields.
    pub credential_hash: String,
    /// Issuance time.
    pub issued_at: Timestamp,
    /// Expiry time.
    pub expires_at: Timestamp,
    /// Hash of the policy definition the credential is bound to.
    pub policy_hash: String,
    /// The credential carried in the token.
    pub credential: PolicyCredential,
}

/// Errors from credential issuance.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// The policy does not exist.
    #[error("policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// The resolved policy version is not `Active`.
    #[error("policy {policy_id} is {status}, not active")]
    PolicyInactive {
        /// Policy identifier.
        policy_id: PolicyId,
        /// Status of the resolved version.
        status: PolicyStatus,
    },

    /// The key service has no current signing key.
    #[error("no active signing key configured")]
    NoSigningKey,

    /// The requested expiry is not after issuance.
    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    /// The requested not-before precedes issuance.
    #[error("invalid notBefore: {0}")]
    InvalidNotBefore(String),

    /// The policy registry failed.
    #[error("policy registry error: {0}")]
    Registry(RegistryError),

    /// The key service or signer failed.
    #[error("key service error: {0}")]
    KeyService(KeyServiceError),

    /// The policy definition could not be hashed.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The token could not be assembled.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Canonicalization failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The caller cancelled issuance.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<RegistryError> for IssuanceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Cancelled(c) => Self::Cancelled(c),
            other => Self::Registry(other),
        }
    }
}

impl From<KeyServiceError> for IssuanceError {
    fn from(e: KeyServiceError) -> Self {
        match e {
            KeyServiceError::Cancelled(c) => Self::Cancelled(c),
            other => Self::KeyService(other),
        }
    }
}

impl IssuanceError {
    /// The client-facing reason code, when the failure has one.
    ///
    /// Configuration and dependency failures have none; callers report
    /// them as internal errors without detail.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Self::PolicyNotFound(_) => Some(ReasonCode::PolicyNotFound),
            Self::PolicyInactive { .. } => Some(ReasonCode::PolicyInactive),
            _ => None,
        }
    }

    /// Whether the failure is a client input error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PolicyNotFound(_) | Self::PolicyInactive { .. } | Self::InvalidExpiry(_) | Self::InvalidNotBefore(_)
        )
    }
}

/// Issues signed policy credentials.
pub struct CredentialIssuer {
    policies: Arc<dyn PolicyRegistry>,
    keys: Arc<dyn KeyManagementService>,
    signer: Arc<dyn CredentialSigner>,
    clock: Arc<dyn Clock>,
}

impl CredentialIssuer {
    /// Create an issuer using the system clock.
    pub fn new(
        policies: Arc<dyn PolicyRegistry>,
        keys: Arc<dyn KeyManagementService>,
        signer: Arc<dyn CredentialSigner>,
    ) -> Self {
        Self {
            policies,
            keys,
            signer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a credential.
    pub async fn issue(
        &self,
        request: IssueRequest,
        cancel: &CancellationSignal,
    ) -> Result<IssuedCredential, IssuanceError> {
        cancel.check()?;

        let policy = cancel
            .guard(self.policies.get_policy(&request.policy_id, request.policy_version, cancel))
            .await??
            .ok_or_else(|| IssuanceError::PolicyNotFound(request.policy_id.clone()))?;
        if !policy.status.is_active() {
            tracing::info!(policy_id = %policy.policy_id, status = %policy.status, "issuance refused: policy inactive");
            return Err(IssuanceError::PolicyInactive {
                policy_id: policy.policy_id,
                status: policy.status,
            });
        }

        let key = cancel
            .guard(self.keys.current_signing_key(cancel))
            .await??
            .ok_or_else(|| {
                tracing::error!("issuance failed: no current signing key");
                IssuanceError::NoSigningKey
            })?;
        if key.is_retired() {
            tracing::error!(key_id = %key.key_id, "issuance failed: current signing key is retired");
            return Err(IssuanceError::NoSigningKey);
        }

        let issued_at = self.clock.now();
        let expires_at = match request.custom_expiry {
            Some(exp) if exp > issued_at => exp,
            Some(exp) => {
                return Err(IssuanceError::InvalidExpiry(format!(
                    "{exp} is not after issuance time {issued_at}"
                )))
            }
            None => issued_at
                .checked_add_secs(policy.default_expiry())
                .ok_or_else(|| IssuanceError::InvalidExpiry("default expiry overflows".into()))?,
        };
        if let Some(nbf) = request.not_before {
            if nbf < issued_at {
                return Err(IssuanceError::InvalidNotBefore(format!(
                    "{nbf} precedes issuance time {issued_at}"
                )));
            }
            if nbf >= expires_at {
                return Err(IssuanceError::InvalidNotBefore(format!("{nbf} is not before expiry {expires_at}")));
            }
        }

        let policy_hash = policy.policy_hash()?;
        let credential = PolicyCredential {
            credential_id: CredentialId::generate(),
            policy_id: policy.policy_id.clone(),
            subject_id: request.subject_id,
            claims: request.claims,
            issued_at,
            expires_at,
            not_before: request.not_before,
            issuer_signing_key_id: key.key_id.clone(),
            device_tag: request.device_tag,
            policy_hash: policy_hash.clone(),
        };

        let header = token::header_for(&key.key_id);
        let payload = credential.to_payload();
        let signing_input = token::signing_input(&header, &payload)?;
        let signature = cancel
            .guard(self.signer.sign(&key.key_id, &signing_input, cancel))
            .await??;
        let token = token::encode(&header, &payload, &signature)?;
        let credential_hash = credential.credential_hash()?;

        tracing::info!(
            policy_id = %credential.policy_id,
            policy_version = policy.version.get(),
            key_id = %key.key_id,
            credential_id = %credential.credential_id,
            "credential issued"
        );
        metrics::counter!("pcred_credentials_issued_total", "policy_id" => credential.policy_id.to_string())
            .increment(1);

        Ok(IssuedCredential {
            token,
            credential_hash,
            issued_at,
            expires_at,
            policy_hash,
            credential,
        })
    }
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer").finish_non_exhaustive()
    }
}
