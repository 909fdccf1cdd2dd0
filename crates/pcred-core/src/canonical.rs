//! # Canonical Serialization: Deterministic Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in digest, commitment, and signature computation.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. It can only be
//! produced by this module's constructors, which decode the input into a
//! JSON value tree and re-encode it under fixed rules:
//!
//! 1. **Sorted keys**: object members are emitted in ascending byte order of
//!    their keys, recursively. Input key order never affects the output.
//! 2. **Compact separators**: no whitespace between tokens.
//! 3. **Literal characters**: `<`, `>`, `&` and all non-ASCII characters are
//!    emitted as-is. Only `"`, `\` and control characters are escaped, so two
//!    documents authored with different escaping conventions canonicalize to
//!    the same bytes.
//! 4. **Literal numbers**: numbers keep the textual form they had when they
//!    were decoded. From raw text, `1` and `1.0` stay distinct.
//!
//! ## Two Entry Points, Two Guarantees
//!
//! - [`CanonicalBytes::from_json_slice()`] takes raw JSON text. The numeric
//!   literal of the input is preserved exactly. Any data after the first
//!   complete JSON value (other than whitespace) is a fatal error.
//! - [`CanonicalBytes::new()`] takes an in-memory `Serialize` value. Numbers
//!   have already been normalized by the type system (`1.0_f64` and `1_i64`
//!   are different Rust values, but a decoded `f64` has lost its original
//!   spelling). Callers needing strict numeric precision must feed raw bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::sha256_hex;
use crate::error::CanonicalizationError;

/// Bytes produced exclusively by deterministic canonicalization.
///
/// # Invariants
///
/// - Constructed only through `new()`, `from_value()`, or `from_json_slice()`.
/// - Object keys are sorted at every nesting level.
/// - Serialization is compact and never HTML-escapes.
///
/// These invariants cannot be violated by downstream code because the inner
/// `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(&value)
    }

    /// Construct canonical bytes from an already-decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Self, CanonicalizationError> {
        let mut out = Vec::with_capacity(128);
        write_canonical(value, &mut out)?;
        Ok(Self(out))
    }

    /// Construct canonical bytes from raw JSON text.
    ///
    /// Exactly one JSON value is accepted. Trailing whitespace is ignored;
    /// any other trailing byte (garbage or a second document) fails with
    /// [`CanonicalizationError::TrailingData`].
    ///
    /// # Errors
    ///
    /// - `InvalidJson` if the leading value does not parse.
    /// - `TrailingData` if anything but whitespace follows it.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, CanonicalizationError> {
        let mut de = serde_json::Deserializer::from_slice(raw);
        let value = Value::deserialize(&mut de).map_err(CanonicalizationError::InvalidJson)?;
        de.end().map_err(|_| CanonicalizationError::TrailingData)?;
        Self::from_value(&value)
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the inner bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Canonicalize raw JSON text and return its lowercase hex SHA-256 digest.
///
/// Deterministic: the same input bytes always yield the same digest.
pub fn canonicalize_and_hash(raw: &[u8]) -> Result<String, CanonicalizationError> {
    let canonical = CanonicalBytes::from_json_slice(raw)?;
    Ok(sha256_hex(&canonical))
}

/// Emit `value` in canonical form.
///
/// Keys are sorted explicitly rather than relying on the map
/// implementation, so the output does not depend on serde_json features
/// enabled elsewhere in the dependency graph.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalizationError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(member, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}
