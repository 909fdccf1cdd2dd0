//! # pcred-engine: Presentation Verification
//!
//! - **Request** (`request.rs`): the request/response contract and the
//!   closed set of [`PresentationKind`]s.
//! - **Verifier** (`verifier.rs`): the [`PresentationVerifier`] plug-in
//!   interface.
//! - **Engine** (`engine.rs`): [`VerificationEngine`], which dispatches by
//!   kind and turns every failure into a reason code.
//! - **Legacy** (`legacy.rs`): signed-credential presentations, checked
//!   through the credential validation pipeline.
//! - **ZKP** (`zkp.rs`): proof presentations, checked against recomputed
//!   challenge and policy hashes before the external proof service is
//!   called.
//!
//! ## Crate Policy
//!
//! - Depends on `pcred-core`, `pcred-policy`, `pcred-vc` and `pcred-zkp`.
//! - Verifiers register explicitly; there is no discovery by name.

pub mod engine;
pub mod legacy;
pub mod request;
pub mod verifier;
pub mod zkp;

pub use engine::VerificationEngine;
pub use legacy::{LegacyCredentialVerifier, DEFAULT_ATTRIBUTE_CLAIM};
pub use request::{PresentationKind, UnknownPresentationKind, Verdict, VerificationRequest, VerificationResult};
pub use verifier::{PresentationVerifier, VerifierError};
pub use zkp::{DeclaredPublicInputs, ZkpConfigError, ZkpPresentation, ZkpVerifier, ZkpVerifierConfig, DEFAULT_PROOF_TIMEOUT};
