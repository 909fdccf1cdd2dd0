//! # Key Management
//!
//! Issuers and validators never hold signing keys directly. They resolve
//! keys through [`KeyManagementService`] and request signatures through
//! [`CredentialSigner`], so several key epochs can coexist during rotation
//! and key storage can live behind an HSM or remote KMS.
//!
//! ## Security Invariants
//!
//! - A `Retired` key is a hard revocation. [`InMemoryKeyService`] never
//!   signs with one and never returns one as the current key. Validators
//!   still see it through `key_by_id` so they can report the retirement.
//! - Retirement is one-way; there is no transition back to `Active`.
//! - Seeds stay inside the service. Callers see [`IssuerSigningKey`], which
//!   carries only the public half.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use pcred_core::error::CryptoError;
use pcred_core::{CancellationSignal, CanonicalBytes, Cancelled, KeyId};
use serde::{Deserialize, Serialize};

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Lifecycle status of an issuer signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Usable for issuance and validation.
    Active,
    /// Revoked; credentials signed with it are invalid.
    Retired,
}

/// The public view of an issuer signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigningKey {
    /// Key identifier, carried as `kid` in token headers.
    pub key_id: KeyId,
    /// Lifecycle status.
    pub status: KeyStatus,
    /// Public key used for verification.
    pub public_key: Ed25519PublicKey,
}

impl IssuerSigningKey {
    /// Whether the key has been retired.
    pub fn is_retired(&self) -> bool {
        self.status == KeyStatus::Retired
    }
}

/// Errors from key management and signing.
#[derive(Debug, thiserror::Error)]
pub enum KeyServiceError {
    /// No key with this id exists.
    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    /// A key with this id is already registered.
    #[error("key already exists: {0}")]
    DuplicateKey(KeyId),

    /// The key is retired and cannot sign.
    #[error("key is retired: {0}")]
    KeyRetired(KeyId),

    /// The key is known only by its public half.
    #[error("no private key held for {0}")]
    VerificationOnly(KeyId),

    /// The backing store could not be reached.
    #[error("key service unavailable: {0}")]
    Unavailable(String),

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The caller cancelled the request.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Read access to issuer signing keys.
#[async_trait]
pub trait KeyManagementService: Send + Sync {
    /// The key new credentials should be signed with, if any.
    async fn current_signing_key(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError>;

    /// Look up any key, active or retired, by id.
    async fn key_by_id(
        &self,
        key_id: &KeyId,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError>;
}

/// Black-box signing over canonical bytes with a managed key.
#[async_trait]
pub trait CredentialSigner: Send + Sync {
    /// Sign `data` with the key named `key_id`.
    async fn sign(
        &self,
        key_id: &KeyId,
        data: &CanonicalBytes,
        cancel: &CancellationSignal,
    ) -> Result<Ed25519Signature, KeyServiceError>;
}

struct KeyEntry {
    status: KeyStatus,
    public_key: Ed25519PublicKey,
    pair: Option<Arc<Ed25519KeyPair>>,
}

#[derive(Default)]
struct KeyState {
    keys: BTreeMap<KeyId, KeyEntry>,
    current: Option<KeyId>,
}

/// In-memory key service with rotation support.
///
/// Not a production key store: seeds live in process memory.
#[derive(Default)]
pub struct InMemoryKeyService {
    state: RwLock<KeyState>,
}

impl InMemoryKeyService {
    /// An empty service with no current key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh key under `key_id`. It becomes current if there is
    /// no current key.
    pub fn generate(&self, key_id: KeyId) -> Result<IssuerSigningKey, KeyServiceError> {
        self.insert(key_id, Ed25519KeyPair::generate())
    }

    /// Import a signing key from its seed. It becomes current if there is no
    /// current key.
    pub fn import(&self, key_id: KeyId, pair: Ed25519KeyPair) -> Result<IssuerSigningKey, KeyServiceError> {
        self.insert(key_id, pair)
    }

    /// Register a verification-only public key with the given status.
    pub fn import_public(
        &self,
        key_id: KeyId,
        public_key: Ed25519PublicKey,
        status: KeyStatus,
    ) -> Result<IssuerSigningKey, KeyServiceError> {
        let mut state = self.state.write();
        if state.keys.contains_key(&key_id) {
            return Err(KeyServiceError::DuplicateKey(key_id));
        }
        state.keys.insert(
            key_id.clone(),
            KeyEntry {
                status,
                public_key: public_key.clone(),
                pair: None,
            },
        );
        Ok(IssuerSigningKey {
            key_id,
            status,
            public_key,
        })
    }

    /// Generate a new key and make it current. The previous current key
    /// stays `Active` so credentials it signed keep validating.
    pub fn rotate(&self, new_key_id: KeyId) -> Result<IssuerSigningKey, KeyServiceError> {
        let key = self.generate(new_key_id.clone())?;
        self.set_current(&new_key_id)?;
        tracing::info!(key_id = %new_key_id, "signing key rotated");
        Ok(key)
    }

    /// Make an existing active key with a private half the current key.
    pub fn set_current(&self, key_id: &KeyId) -> Result<(), KeyServiceError> {
        let mut state = self.state.write();
        let entry = state
            .keys
            .get(key_id)
            .ok_or_else(|| KeyServiceError::KeyNotFound(key_id.clone()))?;
        if entry.status == KeyStatus::Retired {
            return Err(KeyServiceError::KeyRetired(key_id.clone()));
        }
        if entry.pair.is_none() {
            return Err(KeyServiceError::VerificationOnly(key_id.clone()));
        }
        state.current = Some(key_id.clone());
        Ok(())
    }

    /// Retire a key. If it was current, there is no current key afterwards.
    pub fn retire(&self, key_id: &KeyId) -> Result<(), KeyServiceError> {
        let mut state = self.state.write();
        let entry = state
            .keys
            .get_mut(key_id)
            .ok_or_else(|| KeyServiceError::KeyNotFound(key_id.clone()))?;
        entry.status = KeyStatus::Retired;
        if state.current.as_ref() == Some(key_id) {
            state.current = None;
        }
        tracing::warn!(key_id = %key_id, "signing key retired");
        Ok(())
    }

    /// All keys, ordered by id.
    pub fn list(&self) -> Vec<IssuerSigningKey> {
        let state = self.state.read();
        state
            .keys
            .iter()
            .map(|(id, entry)| view(id, entry))
            .collect()
    }

    fn insert(&self, key_id: KeyId, pair: Ed25519KeyPair) -> Result<IssuerSigningKey, KeyServiceError> {
        let mut state = self.state.write();
        if state.keys.contains_key(&key_id) {
            return Err(KeyServiceError::DuplicateKey(key_id));
        }
        let public_key = pair.public_key();
        state.keys.insert(
            key_id.clone(),
            KeyEntry {
                status: KeyStatus::Active,
                public_key: public_key.clone(),
                pair: Some(Arc::new(pair)),
            },
        );
        if state.current.is_none() {
            state.current = Some(key_id.clone());
        }
        Ok(IssuerSigningKey {
            key_id,
            status: KeyStatus::Active,
            public_key,
        })
    }
}

impl std::fmt::Debug for InMemoryKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryKeyService")
            .field("keys", &state.keys.len())
            .field("current", &state.current)
            .finish()
    }
}

fn view(key_id: &KeyId, entry: &KeyEntry) -> IssuerSigningKey {
    IssuerSigningKey {
        key_id: key_id.clone(),
        status: entry.status,
        public_key: entry.public_key.clone(),
    }
}

#[async_trait]
impl KeyManagementService for InMemoryKeyService {
    async fn current_signing_key(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError> {
        cancel.check()?;
        let state = self.state.read();
        Ok(state
            .current
            .as_ref()
            .and_then(|id| state.keys.get(id).map(|entry| view(id, entry)))
            .filter(|key| !key.is_retired()))
    }

    async fn key_by_id(
        &self,
        key_id: &KeyId,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError> {
        cancel.check()?;
        let state = self.state.read();
        Ok(state.keys.get(key_id).map(|entry| view(key_id, entry)))
    }
}

#[async_trait]
impl CredentialSigner for InMemoryKeyService {
    async fn sign(
        &self,
        key_id: &KeyId,
        data: &CanonicalBytes,
        cancel: &CancellationSignal,
    ) -> Result<Ed25519Signature, KeyServiceError> {
        cancel.check()?;
        let pair = {
            let state = self.state.read();
            let entry = state
                .keys
                .get(key_id)
                .ok_or_else(|| KeyServiceError::KeyNotFound(key_id.clone()))?;
            if entry.status == KeyStatus::Retired {
                return Err(KeyServiceError::KeyRetired(key_id.clone()));
            }
            entry
                .pair
                .clone()
                .ok_or_else(|| KeyServiceError::VerificationOnly(key_id.clone()))?
        };
        Ok(pair.sign(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ed25519::verify_with_public_key;

    fn kid(s: &str) -> KeyId {
        KeyId::new(s).unwrap()
    }

    #[tokio::test]
    async fn first_key_becomes_current() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        assert!(svc.current_signing_key(&cancel).await.unwrap().is_none());
        svc.generate(kid("k1")).unwrap();
        svc.generate(kid("k2")).unwrap();
        let current = svc.current_signing_key(&cancel).await.unwrap().unwrap();
        assert_eq!(current.key_id, kid("k1"));
    }

    #[tokio::test]
    async fn rotate_switches_current_and_keeps_old_active() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        svc.generate(kid("k1")).unwrap();
        svc.rotate(kid("k2")).unwrap();
        let current = svc.current_signing_key(&cancel).await.unwrap().unwrap();
        assert_eq!(current.key_id, kid("k2"));
        let old = svc.key_by_id(&kid("k1"), &cancel).await.unwrap().unwrap();
        assert_eq!(old.status, KeyStatus::Active);
    }

    #[tokio::test]
    async fn retire_is_visible_and_clears_current() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        svc.generate(kid("k1")).unwrap();
        svc.retire(&kid("k1")).unwrap();
        assert!(svc.current_signing_key(&cancel).await.unwrap().is_none());
        let key = svc.key_by_id(&kid("k1"), &cancel).await.unwrap().unwrap();
        assert!(key.is_retired());
        assert!(matches!(svc.set_current(&kid("k1")), Err(KeyServiceError::KeyRetired(_))));
    }

    #[tokio::test]
    async fn sign_verifies_and_refuses_retired() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        let key = svc.generate(kid("k1")).unwrap();
        let data = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let sig = svc.sign(&kid("k1"), &data, &cancel).await.unwrap();
        verify_with_public_key(&data, &sig, &key.public_key).unwrap();

        svc.retire(&kid("k1")).unwrap();
        let err = svc.sign(&kid("k1"), &data, &cancel).await.unwrap_err();
        assert!(matches!(err, KeyServiceError::KeyRetired(_)));
    }

    #[tokio::test]
    async fn verification_only_keys_cannot_sign() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        let pk = Ed25519KeyPair::generate().public_key();
        svc.import_public(kid("ext"), pk, KeyStatus::Active).unwrap();
        assert!(svc.current_signing_key(&cancel).await.unwrap().is_none());
        let data = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        let err = svc.sign(&kid("ext"), &data, &cancel).await.unwrap_err();
        assert!(matches!(err, KeyServiceError::VerificationOnly(_)));
    }

    #[tokio::test]
    async fn unknown_and_duplicate_keys() {
        let svc = InMemoryKeyService::new();
        let cancel = CancellationSignal::new();
        assert!(svc.key_by_id(&kid("nope"), &cancel).await.unwrap().is_none());
        svc.generate(kid("k1")).unwrap();
        assert!(matches!(svc.generate(kid("k1")), Err(KeyServiceError::DuplicateKey(_))));
        assert!(matches!(svc.retire(&kid("nope")), Err(KeyServiceError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn cancelled_lookup_fails() {
        let svc = InMemoryKeyService::new();
        svc.generate(kid("k1")).unwrap();
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let err = svc.current_signing_key(&cancel).await.unwrap_err();
        assert!(matches!(err, KeyServiceError::Cancelled(_)));
    }

    #[test]
    fn key_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&KeyStatus::Retired).unwrap(), r#""retired""#);
    }

    #[test]
    fn debug_hides_key_material() {
        let svc = InMemoryKeyService::new();
        svc.generate(kid("k1")).unwrap();
        let dbg = format!("{svc:?}");
        assert!(dbg.contains("keys: 1"));
    }
}
