//! Issue-then-validate scenarios over in-memory collaborators and a fixed
//! clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pcred_core::{
    CancellationSignal, Cancelled, CanonicalBytes, FixedClock, KeyId, PolicyId, ReasonCode, SubjectId, Timestamp,
};
use pcred_crypto::{
    CredentialSigner, Ed25519Signature, InMemoryKeyService, IssuerSigningKey, KeyManagementService, KeyServiceError,
    KeyStatus,
};
use pcred_policy::{InMemoryPolicyRegistry, PolicyDefinition, PolicyStatus};
use pcred_vc::token::{self, b64url};
use pcred_vc::{CredentialIssuer, CredentialValidator, IssuanceError, IssueRequest, IssuedCredential, ValidatorConfig};
use serde_json::{json, Map, Value};

const T0: &str = "2026-03-01T10:00:00Z";

struct Fixture {
    keys: Arc<InMemoryKeyService>,
    policies: Arc<InMemoryPolicyRegistry>,
    clock: Arc<FixedClock>,
}

fn policy(version: u32, status: PolicyStatus) -> PolicyDefinition {
    serde_json::from_value(json!({
        "policyId": "age-over-18",
        "version": version,
        "status": status,
        "circuitId": "age_over_v1",
        "verificationKeyId": "vk-1",
        "verificationKeyFingerprint": "f00d",
        "defaultExpirySecs": 3600,
        "requiredPublicSignalsSchema": {}
    }))
    .unwrap()
}

impl Fixture {
    fn new() -> Self {
        let keys = Arc::new(InMemoryKeyService::new());
        keys.generate(kid("k1")).unwrap();
        let policies = Arc::new(InMemoryPolicyRegistry::new());
        policies.register(policy(1, PolicyStatus::Active)).unwrap();
        let clock = Arc::new(FixedClock::new(t0()));
        Self { keys, policies, clock }
    }

    fn issuer(&self) -> CredentialIssuer {
        CredentialIssuer::new(self.policies.clone(), self.keys.clone(), self.keys.clone()).with_clock(self.clock.clone())
    }

    fn validator(&self) -> CredentialValidator {
        CredentialValidator::new(self.keys.clone()).with_clock(self.clock.clone())
    }

    async fn issue(&self, request: IssueRequest) -> Result<IssuedCredential, IssuanceError> {
        self.issuer().issue(request, &CancellationSignal::new()).await
    }

    async fn validate(&self, token: &str) -> pcred_vc::ValidationResult {
        self.validator().validate(token, &CancellationSignal::new()).await.unwrap()
    }
}

fn kid(s: &str) -> KeyId {
    KeyId::new(s).unwrap()
}

fn t0() -> Timestamp {
    Timestamp::parse(T0).unwrap()
}

fn request() -> IssueRequest {
    let mut claims = Map::new();
    claims.insert("credentialType".into(), json!("AgeOver18"));
    claims.insert("satisfied".into(), json!(true));
    IssueRequest::new(PolicyId::new("age-over-18").unwrap(), SubjectId::new("c0mm1t").unwrap(), claims)
}

/// Sign arbitrary header/payload claims with the fixture's key.
async fn forge(fx: &Fixture, header: Map<String, Value>, payload: Map<String, Value>) -> String {
    let input = token::signing_input(&header, &payload).unwrap();
    let sig = fx.keys.sign(&kid("k1"), &input, &CancellationSignal::new()).await.unwrap();
    token::encode(&header, &payload, &sig).unwrap()
}

#[tokio::test]
async fn issued_credential_validates() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    assert_eq!(issued.issued_at, t0());
    assert_eq!(issued.expires_at, t0().checked_add_secs(3600).unwrap());
    assert_eq!(issued.policy_hash, policy(1, PolicyStatus::Active).policy_hash().unwrap());

    let result = fx.validate(&issued.token).await;
    assert!(result.valid, "{result:?}");
    assert_eq!(result.reason, ReasonCode::Valid);
    let cred = result.credential.unwrap();
    assert_eq!(cred, issued.credential);
    assert_eq!(cred.credential_hash().unwrap(), issued.credential_hash);
}

#[tokio::test]
async fn each_issuance_gets_a_fresh_id() {
    let fx = Fixture::new();
    let a = fx.issue(request()).await.unwrap();
    let b = fx.issue(request()).await.unwrap();
    assert_ne!(a.credential.credential_id, b.credential.credential_id);
    assert_ne!(a.credential_hash, b.credential_hash);
}

#[tokio::test]
async fn unknown_policy_not_found() {
    let fx = Fixture::new();
    let mut req = request();
    req.policy_id = PolicyId::new("residency").unwrap();
    let err = fx.issue(req).await.unwrap_err();
    assert!(matches!(err, IssuanceError::PolicyNotFound(_)));
    assert_eq!(err.reason_code(), Some(ReasonCode::PolicyNotFound));
}

#[tokio::test]
async fn inactive_policies_refused() {
    for status in [PolicyStatus::Draft, PolicyStatus::Deprecated, PolicyStatus::Retired] {
        let fx = Fixture::new();
        let policies = Arc::new(InMemoryPolicyRegistry::new());
        policies.register(policy(1, status)).unwrap();
        let issuer = CredentialIssuer::new(policies, fx.keys.clone(), fx.keys.clone());
        let err = issuer.issue(request(), &CancellationSignal::new()).await.unwrap_err();
        assert!(matches!(err, IssuanceError::PolicyInactive { .. }), "{status}: {err}");
        assert_eq!(err.reason_code(), Some(ReasonCode::PolicyInactive));
    }
}

#[tokio::test]
async fn missing_signing_key_is_configuration_error() {
    let fx = Fixture::new();
    fx.keys.retire(&kid("k1")).unwrap();
    let err = fx.issue(request()).await.unwrap_err();
    assert!(matches!(err, IssuanceError::NoSigningKey));
    assert_eq!(err.reason_code(), None);
    assert!(!err.is_client_error());
}

/// A key service that offers a retired key as current, backed by a signer
/// that signs with whatever it is asked to.
struct RetiredCurrentKey {
    inner: Arc<InMemoryKeyService>,
    signatures: AtomicUsize,
}

#[async_trait]
impl KeyManagementService for RetiredCurrentKey {
    async fn current_signing_key(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError> {
        let key = self.inner.key_by_id(&kid("k1"), cancel).await?;
        Ok(key.map(|key| IssuerSigningKey {
            status: KeyStatus::Retired,
            ..key
        }))
    }

    async fn key_by_id(
        &self,
        key_id: &KeyId,
        cancel: &CancellationSignal,
    ) -> Result<Option<IssuerSigningKey>, KeyServiceError> {
        self.inner.key_by_id(key_id, cancel).await
    }
}

#[async_trait]
impl CredentialSigner for RetiredCurrentKey {
    async fn sign(
        &self,
        key_id: &KeyId,
        data: &CanonicalBytes,
        cancel: &CancellationSignal,
    ) -> Result<Ed25519Signature, KeyServiceError> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(key_id, data, cancel).await
    }
}

#[tokio::test]
async fn retired_current_key_never_signs() {
    let fx = Fixture::new();
    let service = Arc::new(RetiredCurrentKey {
        inner: fx.keys.clone(),
        signatures: AtomicUsize::new(0),
    });
    let issuer = CredentialIssuer::new(fx.policies.clone(), service.clone(), service.clone());
    let err = issuer.issue(request(), &CancellationSignal::new()).await.unwrap_err();
    assert!(matches!(err, IssuanceError::NoSigningKey), "{err}");
    assert!(!err.is_client_error());
    assert_eq!(service.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn custom_expiry_must_follow_issuance() {
    let fx = Fixture::new();
    let mut req = request();
    req.custom_expiry = Some(t0());
    assert!(matches!(fx.issue(req).await, Err(IssuanceError::InvalidExpiry(_))));

    let mut req = request();
    req.custom_expiry = Some(t0().checked_add_secs(120).unwrap());
    let issued = fx.issue(req).await.unwrap();
    assert_eq!(issued.expires_at, t0().checked_add_secs(120).unwrap());
}

#[tokio::test]
async fn not_before_must_not_precede_issuance() {
    let fx = Fixture::new();
    let mut req = request();
    req.not_before = Some(t0().checked_add_secs(-1).unwrap());
    assert!(matches!(fx.issue(req).await, Err(IssuanceError::InvalidNotBefore(_))));
}

#[tokio::test]
async fn retired_key_rejected_even_when_otherwise_valid() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    fx.keys.rotate(kid("k2")).unwrap();
    fx.keys.retire(&kid("k1")).unwrap();
    let result = fx.validate(&issued.token).await;
    assert!(!result.valid);
    assert_eq!(result.reason, ReasonCode::RetiredKeyUsed);
}

#[tokio::test]
async fn rotated_key_still_validates_older_credentials() {
    let fx = Fixture::new();
    let old = fx.issue(request()).await.unwrap();
    fx.keys.rotate(kid("k2")).unwrap();
    let new = fx.issue(request()).await.unwrap();
    assert_eq!(new.credential.issuer_signing_key_id, kid("k2"));
    assert!(fx.validate(&old.token).await.valid);
    assert!(fx.validate(&new.token).await.valid);
}

#[tokio::test]
async fn issued_at_in_future_beyond_skew() {
    let fx = Fixture::new();
    fx.clock.set(t0().checked_add_secs(600).unwrap());
    let issued = fx.issue(request()).await.unwrap();
    fx.clock.set(t0());
    let result = fx.validate(&issued.token).await;
    assert_eq!(result.reason, ReasonCode::ClockSkewExceeded);
}

#[tokio::test]
async fn issued_at_four_minutes_ahead_is_tolerated() {
    let fx = Fixture::new();
    fx.clock.set(t0().checked_add_secs(240).unwrap());
    let issued = fx.issue(request()).await.unwrap();
    fx.clock.set(t0());
    assert!(fx.validate(&issued.token).await.valid);
}

#[tokio::test]
async fn skew_boundary_is_inclusive() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    fx.clock.set(t0().checked_add_secs(300).unwrap());
    assert!(fx.validate(&issued.token).await.valid);
    fx.clock.set(t0().checked_add_secs(301).unwrap());
    assert_eq!(fx.validate(&issued.token).await.reason, ReasonCode::ClockSkewExceeded);
}

#[tokio::test]
async fn configured_skew_is_honored() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    fx.clock.set(t0().checked_add_secs(30).unwrap());
    let strict = fx.validator().with_config(ValidatorConfig {
        clock_skew: std::time::Duration::from_secs(10),
    });
    let result = strict.validate(&issued.token, &CancellationSignal::new()).await.unwrap();
    assert_eq!(result.reason, ReasonCode::ClockSkewExceeded);
}

#[tokio::test]
async fn expiry_boundary() {
    let fx = Fixture::new();
    let mut req = request();
    req.custom_expiry = Some(t0().checked_add_secs(60).unwrap());
    let issued = fx.issue(req).await.unwrap();
    fx.clock.set(t0().checked_add_secs(59).unwrap());
    assert!(fx.validate(&issued.token).await.valid);
    fx.clock.set(t0().checked_add_secs(60).unwrap());
    assert_eq!(fx.validate(&issued.token).await.reason, ReasonCode::Expired);
}

#[tokio::test]
async fn not_before_in_future() {
    let fx = Fixture::new();
    let mut req = request();
    req.not_before = Some(t0().checked_add_secs(120).unwrap());
    let issued = fx.issue(req).await.unwrap();
    fx.clock.set(t0().checked_add_secs(60).unwrap());
    assert_eq!(fx.validate(&issued.token).await.reason, ReasonCode::NotYetValid);
    fx.clock.set(t0().checked_add_secs(120).unwrap());
    assert!(fx.validate(&issued.token).await.valid);
}

#[tokio::test]
async fn tampered_payload_invalid_signature() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let parts: Vec<&str> = issued.token.split('.').collect();
    let mut payload = issued.credential.to_payload();
    payload.insert("sub".into(), json!("someone-else"));
    let forged_payload = b64url(&serde_json::to_vec(&payload).unwrap());
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
    assert_eq!(fx.validate(&forged).await.reason, ReasonCode::InvalidSignature);
}

#[tokio::test]
async fn reencoded_segments_still_verify() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let parts: Vec<&str> = issued.token.split('.').collect();
    let payload = issued.credential.to_payload();
    let pretty = b64url(serde_json::to_string_pretty(&payload).unwrap().as_bytes());
    let reencoded = format!("{}.{}.{}", parts[0], pretty, parts[2]);
    assert_ne!(reencoded, issued.token);
    assert!(fx.validate(&reencoded).await.valid);
}

#[tokio::test]
async fn malformed_tokens() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let parts: Vec<&str> = issued.token.split('.').collect();
    for bad in [
        String::new(),
        "not-a-token".to_string(),
        format!("{}.{}", parts[0], parts[1]),
        format!("{}.{}", issued.token, parts[2]),
        format!("{}.%%%.{}", parts[0], parts[2]),
        format!("{}.{}.{}", b64url(b"[]"), parts[1], parts[2]),
    ] {
        let result = fx.validate(&bad).await;
        assert_eq!(result.reason, ReasonCode::MalformedJwt, "{bad}");
        assert_eq!(result.message.as_deref(), Some("malformed token"));
    }
}

#[tokio::test]
async fn missing_kid() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let mut header = token::header_for(&kid("k1"));
    header.remove("kid");
    let forged = forge(&fx, header, issued.credential.to_payload()).await;
    assert_eq!(fx.validate(&forged).await.reason, ReasonCode::MissingRequiredClaim);
}

#[tokio::test]
async fn unknown_kid() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let other = Arc::new(InMemoryKeyService::new());
    other.generate(kid("elsewhere")).unwrap();
    let validator = CredentialValidator::new(other).with_clock(fx.clock.clone());
    let result = validator.validate(&issued.token, &CancellationSignal::new()).await.unwrap();
    assert_eq!(result.reason, ReasonCode::UnknownKey);
}

#[tokio::test]
async fn missing_timing_claims() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    for claim in ["iat", "exp"] {
        let mut payload = issued.credential.to_payload();
        payload.remove(claim);
        let forged = forge(&fx, token::header_for(&kid("k1")), payload).await;
        assert_eq!(fx.validate(&forged).await.reason, ReasonCode::MissingRequiredClaim, "{claim}");
    }
}

#[tokio::test]
async fn policy_binding_detects_altered_policy() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();

    let bound = fx.validator().with_policy_registry(fx.policies.clone());
    assert!(bound.validate(&issued.token, &CancellationSignal::new()).await.unwrap().valid);

    let altered = Arc::new(InMemoryPolicyRegistry::new());
    let mut def = policy(1, PolicyStatus::Active);
    def.verification_key_fingerprint = "changed".into();
    altered.register(def).unwrap();
    let result = fx
        .validator()
        .with_policy_registry(altered)
        .validate(&issued.token, &CancellationSignal::new())
        .await
        .unwrap();
    assert_eq!(result.reason, ReasonCode::PolicyHashMismatch);

    let empty = Arc::new(InMemoryPolicyRegistry::new());
    let result = fx
        .validator()
        .with_policy_registry(empty)
        .validate(&issued.token, &CancellationSignal::new())
        .await
        .unwrap();
    assert_eq!(result.reason, ReasonCode::PolicyNotFound);
}

#[tokio::test]
async fn policy_binding_accepts_compatible_versions() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();

    let mut v2 = policy(2, PolicyStatus::Active);
    v2.circuit_id = "age_over_v2".into();
    v2.compatible_versions = vec![pcred_core::PolicyVersion::new(1).unwrap()];
    fx.policies.register(v2).unwrap();
    fx.policies
        .set_status(
            &PolicyId::new("age-over-18").unwrap(),
            pcred_core::PolicyVersion::new(1).unwrap(),
            PolicyStatus::Deprecated,
        )
        .unwrap();

    let bound = fx.validator().with_policy_registry(fx.policies.clone());
    assert!(bound.validate(&issued.token, &CancellationSignal::new()).await.unwrap().valid);

    fx.policies
        .set_status(
            &PolicyId::new("age-over-18").unwrap(),
            pcred_core::PolicyVersion::new(1).unwrap(),
            PolicyStatus::Retired,
        )
        .unwrap();
    let result = bound.validate(&issued.token, &CancellationSignal::new()).await.unwrap();
    assert_eq!(result.reason, ReasonCode::PolicyHashMismatch);
}

#[tokio::test]
async fn cancellation_aborts_without_output() {
    let fx = Fixture::new();
    let issued = fx.issue(request()).await.unwrap();
    let cancel = CancellationSignal::new();
    cancel.cancel();
    assert!(matches!(
        fx.issuer().issue(request(), &cancel).await,
        Err(IssuanceError::Cancelled(Cancelled))
    ));
    assert_eq!(fx.validator().validate(&issued.token, &cancel).await.unwrap_err(), Cancelled);
}
