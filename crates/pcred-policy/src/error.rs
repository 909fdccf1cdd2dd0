//! Error types for policy definitions and registries.

use pcred_core::error::CryptoError;
use pcred_core::{Cancelled, CanonicalizationError, PolicyId, PolicyVersion};
use thiserror::Error;

use crate::definition::PolicyStatus;

/// Errors from operations on a single policy definition.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Canonicalization of the definition failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The definition carries no self-attestation signature.
    #[error("policy definition is unsigned")]
    Unsigned,

    /// The self-attestation signature does not verify.
    #[error("policy signature invalid: {0}")]
    Signature(#[from] CryptoError),

    /// The required-public-signals schema does not compile.
    #[error("invalid public signals schema: {0}")]
    InvalidSchema(String),

    /// Public signals violate the policy's schema.
    #[error("public signals rejected: {}", .0.join("; "))]
    PublicSignalsRejected(Vec<String>),

    /// A field holds a value the definition cannot accept.
    #[error("invalid policy definition: {0}")]
    Invalid(String),
}

/// Errors from a policy registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// This `(policy, version)` is already registered.
    #[error("policy {policy_id} {version} already registered")]
    DuplicateVersion {
        /// Policy identifier.
        policy_id: PolicyId,
        /// Conflicting version.
        version: PolicyVersion,
    },

    /// No such policy or version.
    #[error("policy {policy_id} not found")]
    NotFound {
        /// Policy identifier.
        policy_id: PolicyId,
    },

    /// The requested status change is not a legal lifecycle transition.
    #[error("illegal status transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current status.
        from: PolicyStatus,
        /// Requested status.
        to: PolicyStatus,
    },

    /// The definition was rejected at registration.
    #[error(transparent)]
    InvalidDefinition(#[from] PolicyError),

    /// The backing store could not be reached.
    #[error("policy registry unavailable: {0}")]
    Unavailable(String),

    /// The caller cancelled the request.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
