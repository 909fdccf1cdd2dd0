//! # Policy Credentials
//!
//! A [`PolicyCredential`] asserts that a pseudonymous subject satisfies a
//! policy. It travels as the payload of a compact signed token.
//!
//! ## Payload Claims
//!
//! | Claim | Field | Required |
//! |---|---|---|
//! | `jti` | credential id | yes |
//! | `sub` | subject id | yes |
//! | `iat`, `exp` | issued / expires (Unix seconds) | yes |
//! | `nbf` | not before (Unix seconds) | no |
//! | `policyId`, `policyHash` | policy binding | yes |
//! | `deviceTag` | device binding | no |
//! | `claims` | attribute claims | yes |
//!
//! ## Credential Hash
//!
//! [`PolicyCredential::credential_hash()`] is SHA-256 over the canonical
//! bytes of the non-repudiable fields only (id, policy, subject, issued,
//! expires, policy hash). It can be recomputed for ZKP binding without
//! re-parsing the token, and does not change if claims are re-encoded.

use pcred_core::{sha256_hex, CanonicalBytes, CanonicalizationError, CredentialId, KeyId, PolicyId, SubjectId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// An issued policy credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCredential {
    /// Fresh unique id per issuance.
    pub credential_id: CredentialId,
    /// Policy the credential attests.
    pub policy_id: PolicyId,
    /// Pseudonymous subject.
    pub subject_id: SubjectId,
    /// Attribute claims.
    pub claims: Map<String, Value>,
    /// Issuance time.
    pub issued_at: Timestamp,
    /// Expiry time; strictly after `issued_at`.
    pub expires_at: Timestamp,
    /// Optional start of validity; not before `issued_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<Timestamp>,
    /// Key that signed the token.
    pub issuer_signing_key_id: KeyId,
    /// Optional device binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_tag: Option<String>,
    /// Hash of the policy definition at issuance.
    pub policy_hash: String,
}

/// A payload claim that is missing or has the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimProblem {
    /// The claim is absent.
    Missing(&'static str),
    /// The claim is present with an unusable value.
    Invalid(&'static str),
}

impl std::fmt::Display for ClaimProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(c) => write!(f, "missing required claim: {c}"),
            Self::Invalid(c) => write!(f, "invalid claim: {c}"),
        }
    }
}

impl PolicyCredential {
    /// Token payload claims for this credential.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut p = Map::new();
        p.insert("jti".into(), Value::String(self.credential_id.to_string()));
        p.insert("sub".into(), Value::String(self.subject_id.to_string()));
        p.insert("iat".into(), json!(self.issued_at.epoch_secs()));
        p.insert("exp".into(), json!(self.expires_at.epoch_secs()));
        if let Some(nbf) = self.not_before {
            p.insert("nbf".into(), json!(nbf.epoch_secs()));
        }
        p.insert("policyId".into(), Value::String(self.policy_id.to_string()));
        p.insert("policyHash".into(), Value::String(self.policy_hash.clone()));
        if let Some(tag) = &self.device_tag {
            p.insert("deviceTag".into(), Value::String(tag.clone()));
        }
        p.insert("claims".into(), Value::Object(self.claims.clone()));
        p
    }

    /// Rebuild a credential from token payload claims.
    pub fn from_payload(payload: &Map<String, Value>, key_id: KeyId) -> Result<Self, ClaimProblem> {
        let credential_id = CredentialId::parse(required_str(payload, "jti")?)
            .map_err(|_| ClaimProblem::Invalid("jti"))?;
        let subject_id = SubjectId::new(required_str(payload, "sub")?).map_err(|_| ClaimProblem::Invalid("sub"))?;
        let policy_id =
            PolicyId::new(required_str(payload, "policyId")?).map_err(|_| ClaimProblem::Invalid("policyId"))?;
        let policy_hash = required_str(payload, "policyHash")?.to_string();
        let issued_at = epoch_claim(payload, "iat")?.ok_or(ClaimProblem::Missing("iat"))?;
        let expires_at = epoch_claim(payload, "exp")?.ok_or(ClaimProblem::Missing("exp"))?;
        let not_before = epoch_claim(payload, "nbf")?;
        let device_tag = match payload.get("deviceTag") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ClaimProblem::Invalid("deviceTag")),
        };
        let claims = match payload.get("claims") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(ClaimProblem::Invalid("claims")),
            None => return Err(ClaimProblem::Missing("claims")),
        };
        Ok(Self {
            credential_id,
            policy_id,
            subject_id,
            claims,
            issued_at,
            expires_at,
            not_before,
            issuer_signing_key_id: key_id,
            device_tag,
            policy_hash,
        })
    }

    /// SHA-256 over the canonical non-repudiable fields.
    pub fn credential_hash(&self) -> Result<String, CanonicalizationError> {
        let doc = json!({
            "credentialId": self.credential_id.to_string(),
            "policyId": self.policy_id.as_str(),
            "subjectId": self.subject_id.as_str(),
            "issuedAt": self.issued_at.epoch_secs(),
            "expiresAt": self.expires_at.epoch_secs(),
            "policyHash": self.policy_hash,
        });
        Ok(sha256_hex(&CanonicalBytes::from_value(&doc)?))
    }
}

fn required_str<'a>(payload: &'a Map<String, Value>, claim: &'static str) -> Result<&'a str, ClaimProblem> {
    match payload.get(claim) {
        None | Some(Value::Null) => Err(ClaimProblem::Missing(claim)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ClaimProblem::Invalid(claim)),
    }
}

/// Read an optional Unix-seconds claim. Absent or null is `Ok(None)`;
/// anything but an in-range integer is `Invalid`.
pub(crate) fn epoch_claim(payload: &Map<String, Value>, claim: &'static str) -> Result<Option<Timestamp>, ClaimProblem> {
    match payload.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .and_then(|secs| Timestamp::from_epoch_secs(secs).ok())
            .map(Some)
            .ok_or(ClaimProblem::Invalid(claim)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PolicyCredential {
        let iat = Timestamp::parse("2026-03-01T10:00:00Z").unwrap();
        let mut claims = Map::new();
        claims.insert("credentialType".into(), json!("AgeOver18"));
        claims.insert("satisfied".into(), json!(true));
        PolicyCredential {
            credential_id: CredentialId::generate(),
            policy_id: PolicyId::new("age-over-18").unwrap(),
            subject_id: SubjectId::new("c0mm1tment").unwrap(),
            claims,
            issued_at: iat,
            expires_at: iat.checked_add_secs(3600).unwrap(),
            not_before: None,
            issuer_signing_key_id: KeyId::new("k1").unwrap(),
            device_tag: Some("dev-1".into()),
            policy_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn payload_roundtrip() {
        let cred = sample();
        let payload = cred.to_payload();
        assert_eq!(payload["iat"], json!(cred.issued_at.epoch_secs()));
        assert!(payload.get("nbf").is_none());
        let back = PolicyCredential::from_payload(&payload, KeyId::new("k1").unwrap()).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn missing_and_invalid_claims() {
        let cred = sample();
        let mut payload = cred.to_payload();
        payload.remove("sub");
        assert_eq!(
            PolicyCredential::from_payload(&payload, KeyId::new("k1").unwrap()),
            Err(ClaimProblem::Missing("sub"))
        );

        let mut payload = cred.to_payload();
        payload.insert("exp".into(), json!("tomorrow"));
        assert_eq!(
            PolicyCredential::from_payload(&payload, KeyId::new("k1").unwrap()),
            Err(ClaimProblem::Invalid("exp"))
        );
    }

    #[test]
    fn credential_hash_covers_only_binding_fields() {
        let cred = sample();
        let mut other_claims = cred.clone();
        other_claims.claims.insert("extra".into(), json!(1));
        other_claims.device_tag = None;
        assert_eq!(cred.credential_hash().unwrap(), other_claims.credential_hash().unwrap());

        let mut other_subject = cred.clone();
        other_subject.subject_id = SubjectId::new("someone-else").unwrap();
        assert_ne!(cred.credential_hash().unwrap(), other_subject.credential_hash().unwrap());
    }

    #[test]
    fn credential_hash_is_hex() {
        let h = sample().credential_hash().unwrap();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
