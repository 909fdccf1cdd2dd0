//! # pcred-crypto: Signing Keys and Key Management
//!
//! - **Ed25519** key pairs, public keys and signatures. Signing input is
//!   always `&CanonicalBytes`.
//! - **Key management interfaces** ([`KeyManagementService`],
//!   [`CredentialSigner`]) through which issuers and validators resolve
//!   keys. Both are asynchronous and take a cancellation signal.
//! - **[`InMemoryKeyService`]**, a rotation-aware implementation of both
//!   interfaces for development, tests and the CLI.
//!
//! ## Crate Policy
//!
//! - Depends only on `pcred-core` internally.
//! - No mocking of cryptographic operations in tests; all tests use real
//!   `CanonicalBytes` and real Ed25519.
//! - Private key material is never serialized, logged or printed by `Debug`.

pub mod ed25519;
pub mod key_service;

pub use ed25519::{verify, verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, EDDSA_ALG};
pub use key_service::{
    CredentialSigner, InMemoryKeyService, IssuerSigningKey, KeyManagementService, KeyServiceError, KeyStatus,
};
