//! # Challenge Commitments
//!
//! A ZKP presentation answers a server-issued [`Challenge`]. The server
//! commits to the challenge document with HMAC-SHA-256 under its challenge
//! key; the commitment, not the document, is a public input of the proof.
//!
//! ```text
//! commitment = HMAC-SHA256(challenge_key, canonical(challenge))
//! ```
//!
//! ## Security Invariants
//!
//! - Clients cannot mint challenges: without the key they cannot produce a
//!   commitment that the server will recompute.
//! - The document travels with the presentation, so verification is
//!   stateless. Any edit to it (a later `expiresAt`, another `policyId`)
//!   changes the recomputed commitment.
//! - Commitments are compared in constant time.

use std::sync::Arc;

use pcred_core::{
    constant_time_eq_hex, hmac_commitment, CanonicalBytes, Clock, CommitmentError, CommitmentKey, PolicyId,
    SystemClock, Timestamp,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default challenge lifetime.
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Error issuing or committing to a challenge.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// The commitment could not be computed.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    /// The lifetime is not positive or overflows the timestamp range.
    #[error("invalid challenge lifetime: {0}s")]
    InvalidTtl(i64),
}

/// A server-issued challenge document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Unique id of this challenge.
    pub challenge_id: String,
    /// 32 random bytes, hex.
    pub nonce: String,
    /// Policy the presentation must satisfy.
    pub policy_id: PolicyId,
    /// Intended relying party, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Issue time.
    pub issued_at: Timestamp,
    /// End of validity (exclusive).
    pub expires_at: Timestamp,
}

impl Challenge {
    /// Hex HMAC commitment to the canonical form of this document.
    pub fn commitment(&self, key: &CommitmentKey) -> Result<String, CommitmentError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(hmac_commitment(&canonical, key)?.to_hex())
    }

    /// Recompute the commitment and compare it with `declared`.
    pub fn matches_commitment(&self, key: &CommitmentKey, declared: &str) -> Result<bool, CommitmentError> {
        Ok(constant_time_eq_hex(&self.commitment(key)?, declared))
    }

    /// Whether the challenge has expired at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A challenge together with its commitment, as handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedChallenge {
    /// The challenge document.
    pub challenge: Challenge,
    /// Hex HMAC commitment to `challenge`.
    pub commitment: String,
}

/// Issues committed challenges.
pub struct ChallengeIssuer {
    key: CommitmentKey,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl ChallengeIssuer {
    /// An issuer with the default lifetime and the system clock.
    pub fn new(key: CommitmentKey) -> Self {
        Self {
            key,
            ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the lifetime.
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Result<Self, ChallengeError> {
        if ttl_secs <= 0 {
            return Err(ChallengeError::InvalidTtl(ttl_secs));
        }
        self.ttl_secs = ttl_secs;
        Ok(self)
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a fresh challenge for `policy_id`.
    pub fn issue(&self, policy_id: PolicyId, audience: Option<String>) -> Result<IssuedChallenge, ChallengeError> {
        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_secs(self.ttl_secs)
            .ok_or(ChallengeError::InvalidTtl(self.ttl_secs))?;

        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);

        let challenge = Challenge {
            challenge_id: uuid::Uuid::new_v4().to_string(),
            nonce: pcred_core::bytes_to_hex(&nonce),
            policy_id,
            audience,
            issued_at,
            expires_at,
        };
        let commitment = challenge.commitment(&self.key)?;
        tracing::debug!(challenge_id = %challenge.challenge_id, policy_id = %challenge.policy_id, "challenge issued");
        Ok(IssuedChallenge { challenge, commitment })
    }
}
