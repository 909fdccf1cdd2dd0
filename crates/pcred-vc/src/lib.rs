//! # pcred-vc: Policy Credentials
//!
//! - **Credential** (`credential.rs`): [`PolicyCredential`], its token
//!   payload mapping and the credential hash used for ZKP binding.
//! - **Token** (`token.rs`): the three-segment compact token codec and the
//!   canonical signing input.
//! - **Issuer** (`issuer.rs`): [`CredentialIssuer`], which binds a
//!   credential to the canonical policy hash and has it signed.
//! - **Validator** (`validator.rs`): [`CredentialValidator`], the ordered
//!   fail-fast validation pipeline.
//!
//! ## Security Invariant
//!
//! Signatures are real Ed25519 over `CanonicalBytes`; there is no path that
//! skips verification. A retired signing key invalidates every credential
//! it signed, regardless of signature validity or expiry.
//!
//! ## Crate Policy
//!
//! - Depends on `pcred-core`, `pcred-crypto` and `pcred-policy` internally.
//! - Key and policy access goes through the `KeyManagementService`,
//!   `CredentialSigner` and `PolicyRegistry` traits only.

pub mod credential;
pub mod issuer;
pub mod token;
pub mod validator;

pub use credential::{ClaimProblem, PolicyCredential};
pub use issuer::{CredentialIssuer, IssuanceError, IssueRequest, IssuedCredential};
pub use token::{DecodedToken, TokenError};
pub use validator::{CredentialValidator, ValidationResult, ValidatorConfig, DEFAULT_CLOCK_SKEW};
