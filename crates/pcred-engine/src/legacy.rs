//! # Legacy Credential Verifier
//!
//! Verifies a presentation that embeds a signed policy credential token:
//!
//! ```json
//! {"credential": "<header>.<payload>.<signature>"}
//! ```
//!
//! 1. The token must pass [`CredentialValidator`]. A failure reports
//!    `VC_SIGNATURE_INVALID` followed by the validator's own code.
//! 2. The `credentialType` claim must equal the expected type
//!    (`POLICY_MISMATCH`).
//! 3. The boolean attribute claim (default `satisfied`) must be `true`
//!    (`ATTRIBUTE_NOT_MET`). Truthy non-booleans such as `"true"` or `1` do
//!    not count.

use std::sync::Arc;

use async_trait::async_trait;
use pcred_core::{CancellationSignal, ReasonCode};
use pcred_vc::CredentialValidator;
use serde_json::Value;

use crate::request::{PresentationKind, Verdict};
use crate::verifier::{PresentationVerifier, VerifierError};

/// Default name of the boolean attribute claim.
pub const DEFAULT_ATTRIBUTE_CLAIM: &str = "satisfied";

/// Claim carrying the credential type.
pub const CREDENTIAL_TYPE_CLAIM: &str = "credentialType";

/// Verifies embedded signed credentials.
pub struct LegacyCredentialVerifier {
    validator: Arc<CredentialValidator>,
    expected_credential_type: String,
    attribute_claim: String,
}

impl LegacyCredentialVerifier {
    /// A verifier that expects credentials of `expected_credential_type`.
    pub fn new(validator: Arc<CredentialValidator>, expected_credential_type: impl Into<String>) -> Self {
        Self {
            validator,
            expected_credential_type: expected_credential_type.into(),
            attribute_claim: DEFAULT_ATTRIBUTE_CLAIM.to_string(),
        }
    }

    /// Use another claim as the boolean attribute flag.
    pub fn with_attribute_claim(mut self, claim: impl Into<String>) -> Self {
        self.attribute_claim = claim.into();
        self
    }

    fn reject(codes: Vec<ReasonCode>) -> Verdict {
        Verdict::reject(PresentationKind::LegacyVc, codes)
    }
}

#[async_trait]
impl PresentationVerifier for LegacyCredentialVerifier {
    fn kind(&self) -> PresentationKind {
        PresentationKind::LegacyVc
    }

    async fn verify(&self, presentation: &Value, cancel: &CancellationSignal) -> Result<Verdict, VerifierError> {
        let Some(token) = presentation.get("credential").and_then(Value::as_str) else {
            return Ok(Self::reject(vec![ReasonCode::MalformedPresentation]));
        };

        let result = self.validator.validate(token, cancel).await?;
        if !result.valid {
            if result.reason == ReasonCode::InternalError {
                return Err(VerifierError::Dependency("credential validation failed internally".into()));
            }
            return Ok(Self::reject(vec![ReasonCode::VcSignatureInvalid, result.reason]));
        }
        let Some(credential) = result.credential else {
            return Err(VerifierError::Dependency("validator returned no credential".into()));
        };

        let credential_type = credential.claims.get(CREDENTIAL_TYPE_CLAIM).and_then(Value::as_str);
        if credential_type != Some(self.expected_credential_type.as_str()) {
            tracing::info!(
                expected = %self.expected_credential_type,
                actual = ?credential_type,
                "credential type mismatch"
            );
            return Ok(Self::reject(vec![ReasonCode::PolicyMismatch]));
        }

        if credential.claims.get(&self.attribute_claim) != Some(&Value::Bool(true)) {
            return Ok(Self::reject(vec![ReasonCode::AttributeNotMet]));
        }

        Ok(Verdict::accept(
            PresentationKind::LegacyVc,
            Some(credential.issuer_signing_key_id.to_string()),
        ))
    }
}
