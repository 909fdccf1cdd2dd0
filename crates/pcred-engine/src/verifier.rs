//! # Presentation Verifier Interface

use async_trait::async_trait;
use pcred_core::{CancellationSignal, Cancelled};
use serde_json::Value;
use thiserror::Error;

use crate::request::{PresentationKind, Verdict};

/// A verifier could not reach a verdict.
///
/// Client-input problems are never errors; they are rejecting
/// [`Verdict`]s with a reason code.
#[derive(Error, Debug)]
pub enum VerifierError {
    /// A collaborator (key service, registry, proof service) failed.
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// The caller cancelled the request.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Verifies one kind of presentation.
#[async_trait]
pub trait PresentationVerifier: Send + Sync {
    /// The presentation kind this verifier handles.
    fn kind(&self) -> PresentationKind;

    /// Verify a presentation body.
    async fn verify(&self, presentation: &Value, cancel: &CancellationSignal) -> Result<Verdict, VerifierError>;
}
