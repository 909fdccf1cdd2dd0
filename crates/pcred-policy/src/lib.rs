//! # pcred-policy: Attribute Policies
//!
//! A policy is a named, versioned attribute predicate ("subject is 18 or
//! older") together with the proof circuit that attests it and the default
//! lifetime of credentials issued under it.
//!
//! - **Definition** (`definition.rs`): [`PolicyDefinition`], its lifecycle
//!   [`PolicyStatus`], the canonical policy hash, and Ed25519
//!   self-attestation.
//! - **Schema** (`schema.rs`): validation of ZKP public signals against the
//!   policy's required-public-signals JSON Schema.
//! - **Registry** (`registry.rs`): the [`PolicyRegistry`] lookup interface
//!   and an in-memory implementation.
//!
//! ## Security Invariant
//!
//! Only `Active` definitions may back new credentials. Definitions are never
//! edited in place: a content change is a new version. The registry may
//! change a version's status, which is why status is not part of the
//! policy hash.

pub mod definition;
pub mod error;
pub mod registry;
pub mod schema;

pub use definition::{PolicyDefinition, PolicySignature, PolicyStatus};
pub use error::{PolicyError, RegistryError};
pub use registry::{InMemoryPolicyRegistry, PolicyRegistry};
pub use schema::PublicSignalsSchema;
