//! # Public-Signal Schemas
//!
//! Each policy carries a JSON Schema (draft 2020-12) describing the public
//! signals a ZKP presentation must expose. Verifiers check the signals they
//! recomputed, not the ones the client declared.
//!
//! Schemas are self-contained: remote `$ref` resolution is refused, so
//! validation never touches the network.

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;

use crate::error::PolicyError;

struct NoRemoteRefs;

impl Retrieve for NoRemoteRefs {
    fn retrieve(&self, uri: &Uri<&str>) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("remote schema references are not allowed: {}", uri.as_str()).into())
    }
}

/// A compiled public-signals schema.
pub struct PublicSignalsSchema {
    validator: Validator,
}

impl PublicSignalsSchema {
    /// Compile a schema document.
    pub fn compile(schema: &Value) -> Result<Self, PolicyError> {
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.with_retriever(NoRemoteRefs);
        let validator = opts
            .build(schema)
            .map_err(|e| PolicyError::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validate an instance, collecting every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), PolicyError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::PublicSignalsRejected(violations))
        }
    }
}

impl std::fmt::Debug for PublicSignalsSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PublicSignalsSchema(..)")
    }
}
