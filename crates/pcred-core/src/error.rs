//! # Error Types: Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Cryptographic errors fail loudly with context, but never carry key
//!   material.
//! - Canonicalization errors distinguish unparseable input from trailing
//!   data after a complete document.
//! - Cancellation is its own zero-sized error so callers can tell an
//!   aborted request from a failed one.

use thiserror::Error;

/// Top-level error type for foundational operations.
#[derive(Error, Debug)]
pub enum PcredError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Commitment computation failed.
    #[error("commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    /// A timestamp could not be parsed or represented.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The operation was cancelled by the caller.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// The input is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Non-whitespace data follows the first complete JSON value.
    #[error("extra data after the first JSON value")]
    TrailingData,

    /// A value could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error during keyed commitment.
#[derive(Error, Debug)]
pub enum CommitmentError {
    /// The HMAC key is shorter than the required minimum.
    #[error("key too short: need at least {min} bytes, got {actual}")]
    KeyTooShort {
        /// Minimum accepted length.
        min: usize,
        /// Supplied length.
        actual: usize,
    },

    /// The key could not be decoded or used.
    #[error("invalid commitment key: {0}")]
    InvalidKey(String),

    /// Canonicalization of the committed content failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// The signature bytes are malformed.
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
}

/// The caller cancelled the operation before it completed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;
