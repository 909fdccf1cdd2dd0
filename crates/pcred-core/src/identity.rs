//! # Domain Identity Newtypes
//!
//! Newtype wrappers for identifiers. You cannot pass a `SubjectId` where a
//! `PolicyId` is expected.
//!
//! ## Security Invariant
//!
//! `SubjectId` is pseudonymous by contract: it is an opaque handle (for
//! example a subject commitment), never a real-world identifier. The type
//! does not and cannot check this; it exists so the contract has a name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PcredError;

/// Identifier of a policy (e.g. `"age-over-18"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

/// Pseudonymous subject identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

/// Identifier of an issuer signing key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

/// Unique identifier of one issued credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(Uuid);

/// Version number of a policy definition. Versions start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyVersion(u32);

fn non_empty(kind: &str, value: &str) -> Result<String, PcredError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PcredError::InvalidIdentifier(format!("{kind} must not be empty")));
    }
    if trimmed.len() != value.len() {
        return Err(PcredError::InvalidIdentifier(format!(
            "{kind} must not have leading or trailing whitespace"
        )));
    }
    Ok(value.to_string())
}

impl PolicyId {
    /// Validate and wrap a policy identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self, PcredError> {
        non_empty("policy id", value.as_ref()).map(Self)
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SubjectId {
    /// Validate and wrap a subject identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self, PcredError> {
        non_empty("subject id", value.as_ref()).map(Self)
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl KeyId {
    /// Validate and wrap a key identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self, PcredError> {
        non_empty("key id", value.as_ref()).map(Self)
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CredentialId {
    /// Generate a fresh random credential identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a credential identifier from its string form.
    pub fn parse(s: &str) -> Result<Self, PcredError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| PcredError::InvalidIdentifier(format!("credential id {s:?}: {e}")))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl PolicyVersion {
    /// Validate and wrap a version number. Zero is rejected.
    pub fn new(version: u32) -> Result<Self, PcredError> {
        if version == 0 {
            return Err(PcredError::InvalidIdentifier(
                "policy version must be at least 1".to_string(),
            ));
        }
        Ok(Self(version))
    }

    /// The numeric version.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
