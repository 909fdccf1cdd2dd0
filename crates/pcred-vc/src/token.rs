//! # Compact Token Codec
//!
//! A credential token is three base64url (unpadded) segments joined by `.`:
//! header, payload, signature.
//!
//! ## Security Invariants
//!
//! - Header and payload segments are the base64url of each part's
//!   canonical bytes.
//! - The signature covers the canonical bytes of
//!   `{"header": <header>, "payload": <payload>}` recomputed from the
//!   decoded segments. Re-encoding a segment with a different key order or
//!   whitespace leaves the signature valid; changing any value breaks it.
//! - Decoding is strict: exactly three segments, valid base64url, each JSON
//!   segment a single object with no trailing data.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pcred_core::{CanonicalBytes, CanonicalizationError, KeyId};
use pcred_crypto::{Ed25519Signature, EDDSA_ALG};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// `typ` carried in every header.
pub const TOKEN_TYPE: &str = "JWT";

/// Errors from encoding or decoding tokens.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Not exactly three dot-separated segments.
    #[error("token must have 3 segments, found {0}")]
    SegmentCount(usize),

    /// A segment is not valid unpadded base64url.
    #[error("{segment} segment is not valid base64url")]
    Base64 {
        /// Which segment failed.
        segment: &'static str,
    },

    /// A segment does not hold a single JSON object.
    #[error("{segment} segment is not a JSON object")]
    NotAnObject {
        /// Which segment failed.
        segment: &'static str,
    },

    /// Canonicalization failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// The three decoded parts of a token.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Header claims.
    pub header: Map<String, Value>,
    /// Payload claims.
    pub payload: Map<String, Value>,
    /// Raw signature bytes (length not yet checked).
    pub signature: Vec<u8>,
}

impl DecodedToken {
    /// Split and decode a compact token.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(TokenError::SegmentCount(segments.len()));
        };
        Ok(Self {
            header: decode_object(header, "header")?,
            payload: decode_object(payload, "payload")?,
            signature: decode_segment(signature, "signature")?,
        })
    }

    /// The `kid` header, if present and a non-empty string.
    pub fn key_id(&self) -> Option<KeyId> {
        self.header
            .get("kid")
            .and_then(Value::as_str)
            .and_then(|s| KeyId::new(s).ok())
    }

    /// The `alg` header, if present.
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// The canonical bytes the signature covers.
    pub fn signing_input(&self) -> Result<CanonicalBytes, TokenError> {
        signing_input(&self.header, &self.payload)
    }

    /// The signature, if it has the Ed25519 length.
    pub fn ed25519_signature(&self) -> Option<Ed25519Signature> {
        Ed25519Signature::from_slice(&self.signature).ok()
    }
}

/// Build the header for a token signed by `key_id`.
pub fn header_for(key_id: &KeyId) -> Map<String, Value> {
    let mut header = Map::new();
    header.insert("alg".into(), Value::String(EDDSA_ALG.into()));
    header.insert("typ".into(), Value::String(TOKEN_TYPE.into()));
    header.insert("kid".into(), Value::String(key_id.to_string()));
    header
}

/// Canonical signing input over a header and payload.
pub fn signing_input(header: &Map<String, Value>, payload: &Map<String, Value>) -> Result<CanonicalBytes, TokenError> {
    let doc = json!({"header": header, "payload": payload});
    Ok(CanonicalBytes::from_value(&doc)?)
}

/// Assemble a compact token from its parts.
pub fn encode(
    header: &Map<String, Value>,
    payload: &Map<String, Value>,
    signature: &Ed25519Signature,
) -> Result<String, TokenError> {
    let header = CanonicalBytes::from_value(&Value::Object(header.clone()))?;
    let payload = CanonicalBytes::from_value(&Value::Object(payload.clone()))?;
    Ok(format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.as_bytes()),
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature.as_bytes()),
    ))
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Base64 { segment: name })
}

fn decode_object(segment: &str, name: &'static str) -> Result<Map<String, Value>, TokenError> {
    let bytes = decode_segment(segment, name)?;
    let mut de = serde_json::Deserializer::from_slice(&bytes);
    let value = <Value as serde::Deserialize>::deserialize(&mut de)
        .map_err(|_| TokenError::NotAnObject { segment: name })?;
    de.end().map_err(|_| TokenError::NotAnObject { segment: name })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(TokenError::NotAnObject { segment: name }),
    }
}

/// Base64url-encode arbitrary bytes without padding.
pub fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcred_crypto::Ed25519KeyPair;

    fn sample_token() -> (String, Ed25519KeyPair) {
        let kp = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let header = header_for(&KeyId::new("k1").unwrap());
        let mut payload = Map::new();
        payload.insert("iat".into(), json!(1_700_000_000));
        payload.insert("sub".into(), json!("subj"));
        let sig = kp.sign(&signing_input(&header, &payload).unwrap());
        (encode(&header, &payload, &sig).unwrap(), kp)
    }

    #[test]
    fn decode_roundtrip() {
        let (token, kp) = sample_token();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        let decoded = DecodedToken::decode(&token).unwrap();
        assert_eq!(decoded.key_id().unwrap().as_str(), "k1");
        assert_eq!(decoded.algorithm(), Some("EdDSA"));
        let sig = decoded.ed25519_signature().unwrap();
        pcred_crypto::verify_with_public_key(&decoded.signing_input().unwrap(), &sig, &kp.public_key()).unwrap();
    }

    #[test]
    fn wrong_segment_counts() {
        let (token, _) = sample_token();
        let parts: Vec<&str> = token.split('.').collect();
        let two = format!("{}.{}", parts[0], parts[1]);
        let four = format!("{token}.{}", parts[2]);
        assert!(matches!(DecodedToken::decode(&two), Err(TokenError::SegmentCount(2))));
        assert!(matches!(DecodedToken::decode(&four), Err(TokenError::SegmentCount(4))));
        assert!(matches!(DecodedToken::decode(""), Err(TokenError::SegmentCount(1))));
    }

    #[test]
    fn bad_base64_rejected() {
        let (token, _) = sample_token();
        let parts: Vec<&str> = token.split('.').collect();
        let bad = format!("{}.{}.{}", "!!!", parts[1], parts[2]);
        assert!(matches!(DecodedToken::decode(&bad), Err(TokenError::Base64 { segment: "header" })));
        let padded = format!("{}=.{}.{}", parts[0], parts[1], parts[2]);
        assert!(DecodedToken::decode(&padded).is_err());
    }

    #[test]
    fn non_object_segments_rejected() {
        let arr = b64url(b"[1,2]");
        let trailing = b64url(br#"{"a":1} x"#);
        let obj = b64url(b"{}");
        assert!(matches!(
            DecodedToken::decode(&format!("{arr}.{obj}.{obj}")),
            Err(TokenError::NotAnObject { segment: "header" })
        ));
        assert!(matches!(
            DecodedToken::decode(&format!("{obj}.{trailing}.{obj}")),
            Err(TokenError::NotAnObject { segment: "payload" })
        ));
    }

    #[test]
    fn reencoded_segments_keep_signing_input() {
        let (token, _) = sample_token();
        let decoded = DecodedToken::decode(&token).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let reordered = b64url(b"{ \"sub\" : \"subj\", \"iat\" : 1700000000 }");
        let other = DecodedToken::decode(&format!("{}.{}.{}", parts[0], reordered, parts[2])).unwrap();
        assert_eq!(
            decoded.signing_input().unwrap().as_bytes(),
            other.signing_input().unwrap().as_bytes()
        );
    }

    #[test]
    fn missing_kid_is_none() {
        let obj = b64url(br#"{"alg":"EdDSA"}"#);
        let decoded = DecodedToken::decode(&format!("{obj}.{obj}.")).unwrap();
        assert!(decoded.key_id().is_none());
        assert!(decoded.ed25519_signature().is_none());
    }
}
