//! # Reason Codes
//!
//! Every validation and verification outcome is one of these codes. Each
//! code has a stable integer and a stable string; serde uses the string.
//!
//! ## Stability
//!
//! Codes are appended at the end of their group and never renumbered.
//! Credential-pipeline codes occupy `0..100`, engine codes `100..200`,
//! verifier codes `200..`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Outcome code of a validation or verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReasonCode {
    /// The credential or presentation is valid.
    Valid,
    /// `iat` is further than the tolerance from the validator's clock.
    ClockSkewExceeded,
    /// `nbf` is in the future.
    NotYetValid,
    /// `now >= exp`.
    Expired,
    /// The signing key has been retired.
    RetiredKeyUsed,
    /// The `kid` does not resolve to a known key.
    UnknownKey,
    /// The signature does not verify against the resolved key.
    InvalidSignature,
    /// The token is not three well-formed base64url JSON segments.
    MalformedJwt,
    /// A required header or payload claim is absent.
    MissingRequiredClaim,
    /// The referenced policy does not exist.
    PolicyNotFound,
    /// The referenced policy is not `Active`.
    PolicyInactive,
    /// The credential's policy hash matches no compatible policy version.
    PolicyHashMismatch,

    /// The request carries no presentation type or an unusable body.
    MalformedPresentation,
    /// No verifier is registered for the presentation type.
    UnsupportedPresentation,
    /// An internal failure; details are withheld from the caller.
    InternalError,

    /// The embedded legacy credential failed validation.
    VcSignatureInvalid,
    /// The credential type differs from the one the verifier expects.
    PolicyMismatch,
    /// The attribute flag is absent or false.
    AttributeNotMet,
    /// The proof service rejected the proof.
    ProofInvalid,
    /// Declared public inputs differ from the recomputed ones.
    PublicInputMismatch,
    /// The challenge document has expired.
    ChallengeExpired,
}

impl ReasonCode {
    /// All codes in declaration order.
    pub const ALL: [ReasonCode; 21] = [
        Self::Valid,
        Self::ClockSkewExceeded,
        Self::NotYetValid,
        Self::Expired,
        Self::RetiredKeyUsed,
        Self::UnknownKey,
        Self::InvalidSignature,
        Self::MalformedJwt,
        Self::MissingRequiredClaim,
        Self::PolicyNotFound,
        Self::PolicyInactive,
        Self::PolicyHashMismatch,
        Self::MalformedPresentation,
        Self::UnsupportedPresentation,
        Self::InternalError,
        Self::VcSignatureInvalid,
        Self::PolicyMismatch,
        Self::AttributeNotMet,
        Self::ProofInvalid,
        Self::PublicInputMismatch,
        Self::ChallengeExpired,
    ];

    /// The stable wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::ClockSkewExceeded => "ClockSkewExceeded",
            Self::NotYetValid => "NotYetValid",
            Self::Expired => "Expired",
            Self::RetiredKeyUsed => "RetiredKeyUsed",
            Self::UnknownKey => "UnknownKey",
            Self::InvalidSignature => "InvalidSignature",
            Self::MalformedJwt => "MalformedJwt",
            Self::MissingRequiredClaim => "MissingRequiredClaim",
            Self::PolicyNotFound => "PolicyNotFound",
            Self::PolicyInactive => "PolicyInactive",
            Self::PolicyHashMismatch => "PolicyHashMismatch",
            Self::MalformedPresentation => "MALFORMED_PRESENTATION",
            Self::UnsupportedPresentation => "UNSUPPORTED_PRESENTATION",
            Self::InternalError => "INTERNAL_ERROR",
            Self::VcSignatureInvalid => "VC_SIGNATURE_INVALID",
            Self::PolicyMismatch => "POLICY_MISMATCH",
            Self::AttributeNotMet => "ATTRIBUTE_NOT_MET",
            Self::ProofInvalid => "PROOF_INVALID",
            Self::PublicInputMismatch => "PUBLIC_INPUT_MISMATCH",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
        }
    }

    /// The stable integer.
    pub fn code(&self) -> u16 {
        match self {
            Self::Valid => 0,
            Self::ClockSkewExceeded => 1,
            Self::NotYetValid => 2,
            Self::Expired => 3,
            Self::RetiredKeyUsed => 4,
            Self::UnknownKey => 5,
            Self::InvalidSignature => 6,
            Self::MalformedJwt => 7,
            Self::MissingRequiredClaim => 8,
            Self::PolicyNotFound => 9,
            Self::PolicyInactive => 10,
            Self::PolicyHashMismatch => 11,
            Self::MalformedPresentation => 100,
            Self::UnsupportedPresentation => 101,
            Self::InternalError => 102,
            Self::VcSignatureInvalid => 200,
            Self::PolicyMismatch => 201,
            Self::AttributeNotMet => 202,
            Self::ProofInvalid => 203,
            Self::PublicInputMismatch => 204,
            Self::ChallengeExpired => 205,
        }
    }

    /// Look up a code by its stable integer.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Whether this code denotes success.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown reason-code string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reason code: {0:?}")]
pub struct UnknownReasonCode(pub String);

impl std::str::FromStr for ReasonCode {
    type Err = UnknownReasonCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownReasonCode(s.to_string()))
    }
}

impl Serialize for ReasonCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReasonCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
