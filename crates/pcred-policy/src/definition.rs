//! # Policy Definitions
//!
//! A [`PolicyDefinition`] is identified by `(policy_id, version)`. Credentials
//! bind to the definition they were issued under through its policy hash.
//!
//! ## Security Invariants
//!
//! - The policy hash is SHA-256 over the canonical bytes of the definition
//!   with `signature` and `status` removed. Any change to the predicate,
//!   circuit, verification key, lifetime or schema changes the hash.
//! - The self-attestation signature covers exactly the hashed bytes, so a
//!   verified signature vouches for the policy hash as well.

use pcred_core::{sha256_hex, CanonicalBytes, KeyId, PolicyId, PolicyVersion};
use pcred_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;
use crate::schema::PublicSignalsSchema;

/// Lifecycle status of a policy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    /// Authored, not yet usable.
    Draft,
    /// Usable for issuance.
    Active,
    /// No new issuance; kept for validation of compatible credentials.
    Deprecated,
    /// Withdrawn entirely.
    Retired,
}

impl PolicyStatus {
    /// Whether the status permits issuance.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    ///
    /// Lifecycle only moves forward: `Draft -> Active -> Deprecated ->
    /// Retired`, with retirement reachable from any non-retired status.
    pub fn can_transition_to(&self, next: PolicyStatus) -> bool {
        use PolicyStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Draft, Retired) | (Active, Deprecated) | (Active, Retired) | (Deprecated, Retired)
        )
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// Ed25519 self-attestation of a policy definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySignature {
    /// Key that produced the signature.
    pub key_id: KeyId,
    /// Signature over the definition's hash input.
    pub signature: Ed25519Signature,
}

/// A versioned attribute policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Version number, starting at 1.
    pub version: PolicyVersion,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Identifier of the proof circuit that attests this policy.
    pub circuit_id: String,
    /// Identifier of the circuit's verification key.
    pub verification_key_id: String,
    /// Fingerprint of the circuit's verification key.
    pub verification_key_fingerprint: String,
    /// Earlier versions whose credentials remain acceptable.
    #[serde(default)]
    pub compatible_versions: Vec<PolicyVersion>,
    /// Default credential lifetime in seconds.
    pub default_expiry_secs: u64,
    /// JSON Schema the ZKP public signals must satisfy.
    #[serde(default = "empty_schema")]
    pub required_public_signals_schema: Value,
    /// Optional self-attestation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<PolicySignature>,
}

fn empty_schema() -> Value {
    Value::Object(serde_json::Map::new())
}

impl PolicyDefinition {
    /// Check field-level constraints: non-empty circuit, a positive default
    /// lifetime that fits in `i64`, and a compilable schema.
    pub fn validate(&self) -> Result<(), PolicyError> {
        // Deserialization bypasses PolicyVersion::new.
        if self.version.get() == 0 {
            return Err(PolicyError::Invalid("version must be at least 1".into()));
        }
        if self.circuit_id.trim().is_empty() {
            return Err(PolicyError::Invalid("circuitId must not be empty".into()));
        }
        if self.default_expiry_secs == 0 || i64::try_from(self.default_expiry_secs).is_err() {
            return Err(PolicyError::Invalid(format!(
                "defaultExpirySecs out of range: {}",
                self.default_expiry_secs
            )));
        }
        if self.compatible_versions.contains(&self.version) {
            return Err(PolicyError::Invalid(
                "compatibleVersions must not list the definition's own version".into(),
            ));
        }
        PublicSignalsSchema::compile(&self.required_public_signals_schema)?;
        Ok(())
    }

    /// The canonical bytes covered by the policy hash and the
    /// self-attestation: the definition without `signature` and `status`.
    pub fn hash_input(&self) -> Result<CanonicalBytes, PolicyError> {
        let mut value = serde_json::to_value(self).map_err(pcred_core::CanonicalizationError::from)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("signature");
            obj.remove("status");
        }
        Ok(CanonicalBytes::from_value(&value)?)
    }

    /// Lowercase hex SHA-256 of [`hash_input()`](Self::hash_input).
    pub fn policy_hash(&self) -> Result<String, PolicyError> {
        Ok(sha256_hex(&self.hash_input()?))
    }

    /// Default credential lifetime in seconds.
    pub fn default_expiry(&self) -> i64 {
        i64::try_from(self.default_expiry_secs).unwrap_or(i64::MAX)
    }

    /// Attach a self-attestation signature, replacing any existing one.
    pub fn sign(&mut self, key_id: KeyId, key: &Ed25519KeyPair) -> Result<(), PolicyError> {
        let input = self.hash_input()?;
        self.signature = Some(PolicySignature {
            key_id,
            signature: key.sign(&input),
        });
        Ok(())
    }

    /// Verify the self-attestation against `public_key`.
    pub fn verify_signature(&self, public_key: &Ed25519PublicKey) -> Result<(), PolicyError> {
        let sig = self.signature.as_ref().ok_or(PolicyError::Unsigned)?;
        let input = self.hash_input()?;
        verify_with_public_key(&input, &sig.signature, public_key)?;
        Ok(())
    }

    /// Validate ZKP public signals against this policy's schema.
    pub fn validate_public_signals(&self, signals: &Value) -> Result<(), PolicyError> {
        PublicSignalsSchema::compile(&self.required_public_signals_schema)?.validate(signals)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample(version: u32, status: PolicyStatus) -> PolicyDefinition {
        PolicyDefinition {
            policy_id: PolicyId::new("age-over-18").unwrap(),
            version: PolicyVersion::new(version).unwrap(),
            status,
            circuit_id: "age_over_v1".into(),
            verification_key_id: "vk-age-1".into(),
            verification_key_fingerprint: "3f9a".into(),
            compatible_versions: vec![],
            default_expiry_secs: 3600,
            required_public_signals_schema: json!({
                "type": "object",
                "required": ["policyHash", "challengeHash"],
                "properties": {
                    "policyHash": {"type": "string", "pattern": "^[0-9a-f]{64}$"},
                    "challengeHash": {"type": "string"}
                }
            }),
            signature: None,
        }
    }

    #[test]
    fn hash_is_stable_and_hex() {
        let def = sample(1, PolicyStatus::Active);
        let h = def.policy_hash().unwrap();
        assert_eq!(h.len(), 64);
        assert_eq!(h, def.clone().policy_hash().unwrap());
    }

    #[test]
    fn hash_ignores_status_and_signature() {
        let active = sample(1, PolicyStatus::Active);
        let mut deprecated = sample(1, PolicyStatus::Deprecated);
        deprecated.sign(KeyId::new("admin").unwrap(), &Ed25519KeyPair::generate()).unwrap();
        assert_eq!(active.policy_hash().unwrap(), deprecated.policy_hash().unwrap());
    }

    #[test]
    fn hash_changes_with_content() {
        let a = sample(1, PolicyStatus::Active);
        let mut b = a.clone();
        b.default_expiry_secs = 7200;
        let mut c = a.clone();
        c.circuit_id = "age_over_v2".into();
        assert_ne!(a.policy_hash().unwrap(), b.policy_hash().unwrap());
        assert_ne!(a.policy_hash().unwrap(), c.policy_hash().unwrap());
    }

    #[test]
    fn hash_matches_wire_form_reparsed() {
        let def = sample(1, PolicyStatus::Active);
        let wire = serde_json::to_string_pretty(&def).unwrap();
        let back: PolicyDefinition = serde_json::from_str(&wire).unwrap();
        assert_eq!(def.policy_hash().unwrap(), back.policy_hash().unwrap());
    }

    #[test]
    fn self_attestation_roundtrip() {
        let key = Ed25519KeyPair::generate();
        let mut def = sample(1, PolicyStatus::Active);
        assert!(matches!(def.verify_signature(&key.public_key()), Err(PolicyError::Unsigned)));
        def.sign(KeyId::new("admin").unwrap(), &key).unwrap();
        def.verify_signature(&key.public_key()).unwrap();

        def.verification_key_fingerprint = "tampered".into();
        assert!(matches!(
            def.verify_signature(&key.public_key()),
            Err(PolicyError::Signature(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut def = sample(1, PolicyStatus::Active);
        def.validate().unwrap();
        def.default_expiry_secs = 0;
        assert!(def.validate().is_err());

        let mut def = sample(2, PolicyStatus::Active);
        def.compatible_versions = vec![PolicyVersion::new(2).unwrap()];
        assert!(def.validate().is_err());

        let mut def = sample(1, PolicyStatus::Active);
        def.required_public_signals_schema = json!({"type": 12});
        assert!(matches!(def.validate(), Err(PolicyError::InvalidSchema(_))));
    }

    #[test]
    fn lifecycle_transitions() {
        use PolicyStatus::*;
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Deprecated));
        assert!(Deprecated.can_transition_to(Retired));
        assert!(!Retired.can_transition_to(Active));
        assert!(!Deprecated.can_transition_to(Active));
        assert!(!Active.can_transition_to(Draft));
        assert!(Active.is_active());
        assert!(!Deprecated.is_active());
    }

    #[test]
    fn wire_form_is_camel_case() {
        let v = serde_json::to_value(sample(1, PolicyStatus::Active)).unwrap();
        assert!(v.get("policyId").is_some());
        assert!(v.get("defaultExpirySecs").is_some());
        assert!(v.get("requiredPublicSignalsSchema").is_some());
        assert_eq!(v["status"], "active");
        assert!(v.get("signature").is_none());
    }
}
