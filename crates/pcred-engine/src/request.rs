//! # Verification Request and Response
//!
//! The wire contract of the engine:
//!
//! ```text
//! request  = {"presentationType": string, "presentation": any}
//! response = {"valid": bool, "reasonCodes": [string], "evidenceType": string|null,
//!             "issuer": string|null, "timestampUtc": string}
//! ```
//!
//! `reasonCodes` is never empty. It is exactly `["Valid"]` when `valid` is
//! true.

use pcred_core::{ReasonCode, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The presentation kinds this engine knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PresentationKind {
    /// A signed policy credential token.
    #[serde(rename = "legacy-vc")]
    LegacyVc,
    /// A zero-knowledge proof bound to a server challenge.
    #[serde(rename = "zkp")]
    Zkp,
}

impl PresentationKind {
    /// Every kind, in declaration order.
    pub const ALL: [PresentationKind; 2] = [Self::LegacyVc, Self::Zkp];

    /// The wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyVc => "legacy-vc",
            Self::Zkp => "zkp",
        }
    }
}

impl std::fmt::Display for PresentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A presentation type string that names no known kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown presentation type: {0}")]
pub struct UnknownPresentationKind(pub String);

impl std::str::FromStr for PresentationKind {
    type Err = UnknownPresentationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownPresentationKind(s.to_string()))
    }
}

/// A verification request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Presentation type string; missing and empty are both malformed.
    #[serde(default)]
    pub presentation_type: Option<String>,
    /// The presentation body, interpreted by the matching verifier.
    #[serde(default)]
    pub presentation: Value,
}

impl VerificationRequest {
    /// A request for `kind` carrying `presentation`.
    pub fn new(kind: PresentationKind, presentation: Value) -> Self {
        Self {
            presentation_type: Some(kind.as_str().to_string()),
            presentation,
        }
    }
}

/// What a verifier concluded about one presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Reason codes; `[Valid]` on acceptance.
    pub reason_codes: Vec<ReasonCode>,
    /// Evidence kind that was checked.
    pub evidence_type: Option<String>,
    /// Issuer of the evidence, when known.
    pub issuer: Option<String>,
}

impl Verdict {
    /// Accept the presentation.
    pub fn accept(evidence_type: PresentationKind, issuer: Option<String>) -> Self {
        Self {
            reason_codes: vec![ReasonCode::Valid],
            evidence_type: Some(evidence_type.as_str().to_string()),
            issuer,
        }
    }

    /// Reject the presentation with one or more reasons.
    pub fn reject(evidence_type: PresentationKind, reason_codes: Vec<ReasonCode>) -> Self {
        Self {
            reason_codes,
            evidence_type: Some(evidence_type.as_str().to_string()),
            issuer: None,
        }
    }

    /// Whether this verdict accepts the presentation.
    pub fn is_valid(&self) -> bool {
        self.reason_codes == [ReasonCode::Valid]
    }
}

/// The engine's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the presentation was accepted.
    pub valid: bool,
    /// Reason codes, never empty.
    pub reason_codes: Vec<ReasonCode>,
    /// Evidence kind that was checked.
    pub evidence_type: Option<String>,
    /// Issuer of the evidence, when known.
    pub issuer: Option<String>,
    /// Time of the decision.
    pub timestamp_utc: Timestamp,
}

impl VerificationResult {
    /// Stamp a verifier's verdict.
    pub fn from_verdict(verdict: Verdict, now: Timestamp) -> Self {
        let valid = verdict.is_valid();
        // An empty code list never reaches the caller as "valid".
        let reason_codes = if verdict.reason_codes.is_empty() {
            vec![ReasonCode::InternalError]
        } else {
            verdict.reason_codes
        };
        Self {
            valid,
            reason_codes,
            evidence_type: verdict.evidence_type,
            issuer: if valid { verdict.issuer } else { None },
            timestamp_utc: now,
        }
    }

    /// An engine-level failure with a single code.
    pub fn failure(reason: ReasonCode, now: Timestamp) -> Self {
        Self {
            valid: false,
            reason_codes: vec![reason],
            evidence_type: None,
            issuer: None,
            timestamp_utc: now,
        }
    }
}
