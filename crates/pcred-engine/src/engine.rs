//! # Verification Engine
//!
//! Routes a [`VerificationRequest`] to the verifier registered for its
//! presentation kind and normalizes the outcome.
//!
//! | Condition | Result |
//! |---|---|
//! | `presentationType` missing or empty | `MALFORMED_PRESENTATION` |
//! | type unknown, or known but not registered | `UNSUPPORTED_PRESENTATION` |
//! | verifier fails a dependency | `INTERNAL_ERROR` |
//! | verifier panics | `INTERNAL_ERROR` |
//! | otherwise | the verifier's verdict |
//!
//! ## Security Invariants
//!
//! - Unknown types are data, not programmer error. They never panic.
//! - Every dispatch runs on its own Tokio task. A panic inside a verifier
//!   ends that task only and surfaces as `INTERNAL_ERROR`; no panic payload
//!   or dependency detail reaches the caller.
//! - Cancellation aborts the dispatched task.

use std::collections::BTreeMap;
use std::sync::Arc;

use pcred_core::{CancellationSignal, Cancelled, Clock, ReasonCode, SystemClock};

use crate::request::{PresentationKind, VerificationRequest, VerificationResult};
use crate::verifier::{PresentationVerifier, VerifierError};

/// Dispatches presentations to registered verifiers.
pub struct VerificationEngine {
    verifiers: BTreeMap<PresentationKind, Arc<dyn PresentationVerifier>>,
    clock: Arc<dyn Clock>,
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationEngine {
    /// An engine with no verifiers and the system clock.
    pub fn new() -> Self {
        Self {
            verifiers: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp results.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a verifier under its own kind, returning the verifier it
    /// replaces.
    pub fn register(&mut self, verifier: Arc<dyn PresentationVerifier>) -> Option<Arc<dyn PresentationVerifier>> {
        let kind = verifier.kind();
        tracing::info!(presentation_type = %kind, "verifier registered");
        self.verifiers.insert(kind, verifier)
    }

    /// Builder form of [`register()`](Self::register).
    pub fn with_verifier(mut self, verifier: Arc<dyn PresentationVerifier>) -> Self {
        self.register(verifier);
        self
    }

    /// Kinds with a registered verifier.
    pub fn kinds(&self) -> Vec<PresentationKind> {
        self.verifiers.keys().copied().collect()
    }

    /// Verify one presentation.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
        cancel: &CancellationSignal,
    ) -> Result<VerificationResult, Cancelled> {
        cancel.check()?;
        let now = self.clock.now();

        let type_str = request.presentation_type.as_deref().unwrap_or_default();
        if type_str.is_empty() {
            record("missing", false);
            return Ok(VerificationResult::failure(ReasonCode::MalformedPresentation, now));
        }

        let verifier = match type_str.parse::<PresentationKind>() {
            Ok(kind) => self.verifiers.get(&kind).cloned(),
            Err(_) => None,
        };
        let Some(verifier) = verifier else {
            tracing::info!(presentation_type = %type_str, "unsupported presentation type");
            record("unsupported", false);
            return Ok(VerificationResult::failure(ReasonCode::UnsupportedPresentation, now));
        };

        let kind = verifier.kind();
        let presentation = request.presentation.clone();
        let task_cancel = cancel.clone();
        let mut handle = tokio::spawn(async move { verifier.verify(&presentation, &task_cancel).await });

        let joined = match cancel.guard(&mut handle).await {
            Ok(joined) => joined,
            Err(cancelled) => {
                handle.abort();
                return Err(cancelled);
            }
        };

        let result = match joined {
            Ok(Ok(verdict)) => VerificationResult::from_verdict(verdict, now),
            Ok(Err(VerifierError::Cancelled(cancelled))) => return Err(cancelled),
            Ok(Err(VerifierError::Dependency(detail))) => {
                tracing::error!(presentation_type = %kind, error = %detail, "verifier dependency failed");
                internal_error(kind, now)
            }
            Err(join_error) => {
                tracing::error!(
                    presentation_type = %kind,
                    panicked = join_error.is_panic(),
                    "verifier task failed"
                );
                internal_error(kind, now)
            }
        };

        if result.valid {
            tracing::debug!(presentation_type = %kind, "presentation accepted");
        } else {
            tracing::info!(presentation_type = %kind, reasons = ?result.reason_codes, "presentation rejected");
        }
        record(kind.as_str(), result.valid);
        Ok(result)
    }
}

fn internal_error(kind: PresentationKind, now: pcred_core::Timestamp) -> VerificationResult {
    let mut result = VerificationResult::failure(ReasonCode::InternalError, now);
    result.evidence_type = Some(kind.as_str().to_string());
    result
}

fn record(presentation_type: &'static str, valid: bool) {
    metrics::counter!(
        "pcred_verifications_total",
        "presentation_type" => presentation_type,
        "valid" => if valid { "true" } else { "false" }
    )
    .increment(1);
}
